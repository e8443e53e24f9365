use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use wraplab::export::{encode_png, suggested_name, DirectorySink, DownloadSink, FileSink};
use wraplab::{
    export, hit_test, render_export, render_preview, segment_regions, FitTransform, Project, Rgb,
    Template, DEFAULT_THRESHOLD,
};

#[derive(Parser, Debug)]
#[command(name = "wraplab", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a project's masked preview as a PNG.
    Preview(PreviewArgs),
    /// Render a project at full quality into a square PNG.
    Export(ExportArgs),
    /// Segment a template's alpha mask and report the regions.
    Regions(RegionsArgs),
    /// Print which layer sits under a point in the preview viewport.
    Hit(HitArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Preview viewport width in pixels.
    #[arg(long, default_value_t = 920)]
    width: u32,

    /// Preview viewport height in pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Exact output PNG path. Omitted: save a suggested filename into
    /// `--dir` (or the current directory).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory to save into when no exact path is given.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Square output edge in pixels.
    #[arg(long, default_value_t = 1024)]
    size: u32,
}

#[derive(Parser, Debug)]
struct RegionsArgs {
    /// Template image path.
    #[arg(long)]
    template: PathBuf,

    /// Alpha threshold for binarization (0-255, inclusive).
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Directory to write one PNG per region into.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct HitArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Pointer x in the preview viewport.
    #[arg(long)]
    x: f64,

    /// Pointer y in the preview viewport.
    #[arg(long)]
    y: f64,

    /// Preview viewport width in pixels.
    #[arg(long, default_value_t = 920)]
    width: u32,

    /// Preview viewport height in pixels.
    #[arg(long, default_value_t = 600)]
    height: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Preview(args) => cmd_preview(args),
        Command::Export(args) => cmd_export(args),
        Command::Regions(args) => cmd_regions(args),
        Command::Hit(args) => cmd_hit(args),
    }
}

fn load_project(path: &Path) -> anyhow::Result<(Project, Template, wraplab::LayerStack)> {
    let project = Project::load(path)?;
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let (template, stack) = project.materialize(root)?;
    Ok((project, template, stack))
}

fn write_png(raster: &wraplab::Raster, out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
    }
    let bytes = encode_png(raster)?;
    fs::write(out, bytes).with_context(|| format!("write png '{}'", out.display()))?;
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let (_, template, stack) = load_project(&args.in_path)?;
    let frame = render_preview(&template, &stack, args.width, args.height)?;
    write_png(&frame, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let (project, template, stack) = load_project(&args.in_path)?;
    let frame = render_export(&template, &stack, args.size)?;

    if let Some(out) = &args.out {
        let mut sinks: Vec<Box<dyn export::ExportSink>> = vec![Box::new(FileSink::new(out))];
        let bytes = encode_png(&frame)?;
        export::export_with_fallback(&mut sinks, "export.png", &bytes)?;
        eprintln!("wrote {}", out.display());
        return Ok(());
    }

    let name = suggested_name(project.model.as_deref(), args.size);
    let mut sinks: Vec<Box<dyn export::ExportSink>> = Vec::new();
    if let Some(dir) = &args.dir {
        sinks.push(Box::new(DirectorySink::new(dir)));
    }
    sinks.push(Box::new(DownloadSink::default()));

    let bytes = encode_png(&frame)?;
    match export::export_with_fallback(&mut sinks, &name, &bytes)? {
        export::SaveOutcome::Saved(path) => eprintln!("wrote {}", path.display()),
        export::SaveOutcome::Cancelled => eprintln!("export cancelled"),
    }
    Ok(())
}

fn cmd_regions(args: RegionsArgs) -> anyhow::Result<()> {
    let template = Template::load(&args.template)?;
    let mask = template.alpha_mask()?;
    let regions = segment_regions(&mask, args.threshold, Rgb::new(255, 59, 48))?;

    println!(
        "{} region(s) at threshold {} ({}x{} template)",
        regions.len(),
        args.threshold,
        template.width(),
        template.height()
    );
    for region in &regions {
        let b = &region.bounds;
        println!(
            "  region {}: {}x{} at ({}, {})",
            region.label,
            b.width(),
            b.height(),
            b.min_x,
            b.min_y
        );
    }

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;
        for region in &regions {
            let out = dir.join(format!("region-{}.png", region.label));
            write_png(&region.raster, &out)?;
        }
        eprintln!("wrote {} region raster(s) to {}", regions.len(), dir.display());
    }
    Ok(())
}

fn cmd_hit(args: HitArgs) -> anyhow::Result<()> {
    let (_, template, stack) = load_project(&args.in_path)?;
    let view = FitTransform::fit(template.width(), template.height(), args.width, args.height);
    match hit_test(&stack, &view, args.x, args.y) {
        Some(i) => {
            let layer = &stack.layers()[i];
            println!("layer {} ('{}')", i, layer.name);
        }
        None => println!("no layer"),
    }
    Ok(())
}
