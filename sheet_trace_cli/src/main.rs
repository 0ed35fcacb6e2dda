use clap::{Parser, Subcommand};
use sheet_trace::{
    frame::{Orientation, ViewContext, VolumeFrame},
    infill::ExportMesh,
    io::{read_surfaces_json, write_surfaces_json},
    project::{Project, DEFAULT_VOXEL_SIZE_UM},
    surface::Surface,
};

/// Batch inspection and export of traced fragment files.
#[derive(Parser)]
#[command(name = "sheet_trace_cli", version)]
struct Cli {
    /// Voxel size in micrometres
    #[arg(long, default_value_t = DEFAULT_VOXEL_SIZE_UM, global = true)]
    voxel_size: f64,
    /// Volume extent as x,y,z voxel counts; derived from the points if omitted
    #[arg(long, global = true)]
    volume: Option<String>,
    /// View direction: 0 looks along x (YZ slices), 1 along y (XZ slices)
    #[arg(long, default_value_t = 0, global = true)]
    view: i64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the fragments in a JSON file.
    Info { path: String },
    /// Print the cross-section of one fragment with a slice plane.
    Section {
        path: String,
        name: String,
        /// View axis the slice plane is normal to (0, 1 or 2)
        axis: usize,
        position: i64,
    },
    /// Add grid infill points to every fragment and save the result.
    Infill {
        input: String,
        output: String,
        spacing: f64,
    },
    /// Write the export meshes of all fragments as JSON.
    ExportMesh {
        input: String,
        output: String,
        #[arg(long, default_value_t = 0.0)]
        spacing: f64,
    },
}

#[derive(serde::Serialize)]
struct NamedMesh<'a> {
    name: &'a str,
    #[serde(flatten)]
    mesh: ExportMesh,
}

fn parse_volume(text: &str) -> Result<[usize; 3], String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z voxel counts, got '{text}'"));
    }
    let mut sizes = [0usize; 3];
    for (size, part) in sizes.iter_mut().zip(&parts) {
        *size = part
            .parse()
            .map_err(|e| format!("invalid voxel count '{part}': {e}"))?;
    }
    Ok(sizes)
}

/// Smallest unit frame at the origin that holds every point.
fn frame_around(surfaces: &[Surface]) -> VolumeFrame {
    let mut sizes = [1usize; 3];
    for p in surfaces.iter().flat_map(|s| s.points()) {
        for (axis, size) in sizes.iter_mut().enumerate() {
            let c = p.coord(axis);
            if c.is_finite() && c >= 0.0 {
                *size = (*size).max(c.ceil() as usize + 1);
            }
        }
    }
    VolumeFrame::unit(sizes)
}

fn load_project(cli: &Cli, path: &str) -> Result<Project, String> {
    let surfaces = read_surfaces_json(path).map_err(|e| format!("Error reading {path}: {e}"))?;
    let frame = match &cli.volume {
        Some(text) => VolumeFrame::unit(parse_volume(text)?),
        None => frame_around(&surfaces),
    };
    let orientation = Orientation::from_direction(cli.view)
        .ok_or_else(|| format!("invalid view direction {}", cli.view))?;
    let mut project = Project::new();
    project.set_voxel_size_um(cli.voxel_size);
    project.set_view(Some(ViewContext::new(frame, orientation)));
    // sources first, so echoes are filled as they are inserted
    let (echoes, sources): (Vec<Surface>, Vec<Surface>) =
        surfaces.into_iter().partition(|s| s.echo_source().is_some());
    for surface in sources.into_iter().chain(echoes) {
        if project.insert(surface).is_some() {
            log::warn!("duplicate fragment name in {path}, keeping the last one");
        }
    }
    Ok(project)
}

fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Commands::Info { path } => {
            let project = load_project(cli, path)?;
            for s in project.iter() {
                let triangles = s.triangulation().map_or(0, |t| t.len());
                println!(
                    "{}: {:?} direction {}, {} points, {} triangles, area {:.4} cm^2",
                    s.name(),
                    s.kind(),
                    s.orientation().direction(),
                    s.points().len(),
                    triangles,
                    s.area_sq_cm(project.voxel_size_um()),
                );
                if let Some(source) = s.echo_source() {
                    println!("  echoes {source}");
                }
            }
        }
        Commands::Section {
            path,
            name,
            axis,
            position,
        } => {
            let project = load_project(cli, path)?;
            let surface = project
                .get(name)
                .ok_or_else(|| format!("no fragment named {name} in {path}"))?;
            let points = surface.cross_section(*axis, *position);
            for p in &points {
                println!("{},{}", p.x, p.y);
            }
            eprintln!("{} section points", points.len());
        }
        Commands::Infill {
            input,
            output,
            spacing,
        } => {
            let mut project = load_project(cli, input)?;
            let mut added = 0;
            for name in project.names() {
                let Some(surface) = project.get(&name) else {
                    continue;
                };
                if surface.echo_source().is_some() {
                    continue;
                }
                let extra = surface.infill_points(*spacing);
                added += extra.len();
                let mut points = surface.points().to_vec();
                points.extend(extra);
                project.edit(&name, |s| s.set_points(points));
            }
            let surfaces: Vec<&Surface> = project.iter().collect();
            write_surfaces_json(output, &surfaces).map_err(|e| format!("Error writing {output}: {e}"))?;
            println!("Added {added} infill points");
        }
        Commands::ExportMesh {
            input,
            output,
            spacing,
        } => {
            let project = load_project(cli, input)?;
            let meshes: Vec<NamedMesh> = project
                .iter()
                .map(|s| NamedMesh {
                    name: s.name(),
                    mesh: s.export_mesh(*spacing),
                })
                .collect();
            let vertices: usize = meshes.iter().map(|m| m.mesh.vertices.len()).sum();
            let triangles: usize = meshes.iter().map(|m| m.mesh.triangles.len()).sum();
            let json = serde_json::to_string_pretty(&meshes).map_err(|e| e.to_string())?;
            sheet_trace::io::write_string(output, &json)
                .map_err(|e| format!("Error writing {output}: {e}"))?;
            println!("Exported {vertices} vertices, {triangles} triangles");
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
