use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tableau::{
    Animation, AnimationConfig, Application, Core, CoreOptions, Ease, EndAction, FrameLoop,
    FrameLoopOptions, NodeId, NodeProperty, NotifyCondition, NotifyMode, PixelData,
    PropertyNotification, PropertyValue, RecordingController, RemoveAction, Texture, TextureType,
    node_property,
};

#[derive(Parser, Debug)]
#[command(name = "tableau", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the demo scene headless and print a JSON summary.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Frames to render.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Milliseconds each frame advances the scene by.
    #[arg(long, default_value_t = 16)]
    interval_ms: u32,

    /// Core options JSON (surface size, call tracing).
    #[arg(long)]
    options: Option<PathBuf>,

    /// Render on a separate thread.
    #[arg(long)]
    threaded: bool,

    /// Write the recorded backend calls as JSON.
    #[arg(long)]
    trace_json: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
struct RunSummary {
    frames: u64,
    threaded: bool,
    animations_finished: usize,
    property_notifications: usize,
    mover_position: Option<PropertyValue>,
    follower_position: Option<PropertyValue>,
    controller: tableau::graphics::recording::ControllerSummary,
}

/// Handles that must outlive the run.
struct DemoScene {
    mover: NodeId,
    follower: NodeId,
    _texture: Texture,
    _animation: Animation,
    _notification: PropertyNotification,
    finished: Arc<AtomicUsize>,
    notified: Arc<AtomicUsize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
    }
}

fn read_options(path: &Path) -> anyhow::Result<CoreOptions> {
    let f = File::open(path).with_context(|| format!("open options '{}'", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| "parse options JSON")
}

fn build_scene(core: &Core) -> anyhow::Result<DemoScene> {
    let mover = core.create_node()?;
    let follower = core.create_node()?;
    core.add_child(core.root(), mover)?;
    core.add_child(core.root(), follower)?;
    core.bake_property(
        NodeProperty::new(mover, node_property::SIZE),
        PropertyValue::Vector3([64.0, 64.0, 0.0]),
    )?;

    let texture = Texture::new(
        core,
        TextureType::Texture2D,
        tableau::PixelFormat::Rgba8888,
        64,
        64,
    )?;
    let checker = image::RgbaImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([32, 32, 32, 255])
        }
    });
    texture.upload(PixelData::from_rgba_image(checker))?;
    core.set_node_texture(mover, Some(&texture))?;

    let mover_position = NodeProperty::new(mover, node_property::POSITION);
    core.add_constraint(
        NodeProperty::new(follower, node_property::POSITION),
        &[mover_position],
        |_: &PropertyValue, inputs: &[PropertyValue]| match inputs.first() {
            Some(PropertyValue::Vector3([x, y, z])) => PropertyValue::Vector3([*x, y + 80.0, *z]),
            _ => PropertyValue::Vector3([0.0; 3]),
        },
        RemoveAction::Bake,
    )?;

    let animation = Animation::new(
        core,
        AnimationConfig {
            duration: 0.5,
            end_action: EndAction::Bake,
            progress_marker: Some(0.5),
            ..AnimationConfig::default()
        },
    )?;
    animation.animate_to(
        mover_position,
        PropertyValue::Vector3([200.0, 0.0, 0.0]),
        Ease::InOutQuad,
    )?;
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    animation.on_finished(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;
    animation.play()?;

    let notification = PropertyNotification::new(
        core,
        mover_position,
        NotifyCondition::GreaterThan(100.0),
        NotifyMode::NotifyOnChanged,
    )?;
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    notification.on_notify(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;

    Ok(DemoScene {
        mover,
        follower,
        _texture: texture,
        _animation: animation,
        _notification: notification,
        finished,
        notified,
    })
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let options = match &args.options {
        Some(path) => read_options(path)?,
        None => CoreOptions::default(),
    };

    let (summary, trace) = if args.threaded {
        run_threaded(&args, options)?
    } else {
        run_single(&args, options)?
    };

    if let Some(path) = &args.trace_json {
        let f = File::create(path)
            .with_context(|| format!("create trace file '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(f), &trace)
            .with_context(|| format!("write trace '{}'", path.display()))?;
        eprintln!("wrote {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_single(
    args: &RunArgs,
    options: CoreOptions,
) -> anyhow::Result<(RunSummary, tableau::graphics::recording::TraceCallStack)> {
    let mut app = Application::new(options)?;
    let scene = build_scene(app.core())?;
    for _ in 0..args.frames {
        app.render(args.interval_ms)?;
        app.send_notification();
    }
    let summary = RunSummary {
        frames: args.frames,
        threaded: false,
        animations_finished: scene.finished.load(Ordering::Relaxed),
        property_notifications: scene.notified.load(Ordering::Relaxed),
        mover_position: current(&app, scene.mover),
        follower_position: current(&app, scene.follower),
        controller: app.controller().summary(),
    };
    Ok((summary, app.controller().call_trace().clone()))
}

fn current(app: &Application, node: NodeId) -> Option<PropertyValue> {
    app.current_value(NodeProperty::new(node, node_property::POSITION))
        .ok()
}

fn run_threaded(
    args: &RunArgs,
    options: CoreOptions,
) -> anyhow::Result<(RunSummary, tableau::graphics::recording::TraceCallStack)> {
    let controller = RecordingController::new(tableau::ControllerOptions {
        trace: options.trace_calls,
        ..tableau::ControllerOptions::default()
    });
    let (core, channels) = Core::new(options);
    let scene = build_scene(&core)?;
    let mut frame_loop = FrameLoop::new(
        channels,
        controller,
        FrameLoopOptions {
            frames: args.frames,
            frame_interval_ms: args.interval_ms,
            ..FrameLoopOptions::default()
        },
    )?;
    let stats = frame_loop.run()?;
    core.process_events();
    tracing::debug!(?stats, "frame loop finished");

    let value = |node| {
        frame_loop
            .update_manager()
            .current_value(NodeProperty::new(node, node_property::POSITION))
            .ok()
    };
    let summary = RunSummary {
        frames: stats.frames_rendered,
        threaded: true,
        animations_finished: scene.finished.load(Ordering::Relaxed),
        property_notifications: scene.notified.load(Ordering::Relaxed),
        mover_position: value(scene.mover),
        follower_position: value(scene.follower),
        controller: frame_loop.render_manager().controller().summary(),
    };
    let trace = frame_loop.render_manager().controller().call_trace().clone();
    frame_loop.shutdown();
    Ok((summary, trace))
}
