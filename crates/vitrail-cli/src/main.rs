//! Command line launcher and demo application for the vitrail engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vitrail_core::{
    Criteria, Dimension, ElementKind, Engine, FlowDirection, Node, NodeId, Rgb, Rgba, Settings,
    Style, World,
};

/// Renders a small interactive demo tree. Tab cycles the menu, enter
/// focuses a row, `q` quits.
#[derive(Parser, Debug)]
#[command(name = "vitrail", version, about)]
struct Args {
    /// Milliseconds a mouse button must be held before press events are
    /// synthesized instead of clicks.
    #[arg(long, value_name = "MS")]
    mouse_press_cooldown: Option<u64>,

    /// Skip per-row newlines in the frame encoder and let the terminal
    /// wrap the single output line itself.
    #[arg(long)]
    enable_word_wrapping: bool,

    /// Interpolate colors in gamma-corrected space.
    #[arg(long)]
    enable_gamma_correction: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    logger_file_name: Option<PathBuf>,

    /// Select the alternate output backend.
    #[arg(long)]
    enable_drm: bool,
}

impl Args {
    fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(cooldown) = self.mouse_press_cooldown {
            settings.mouse_press_down_cooldown_ms = cooldown;
        }
        settings.word_wrapping = self.enable_word_wrapping;
        settings.enable_gamma_correction = self.enable_gamma_correction;
        settings.enable_drm = self.enable_drm;
        settings.logger_file_name = self.logger_file_name.clone();
        settings
    }
}

fn init_logging(file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn text_style(width: i32, fg: Rgb, bg: Rgb) -> Style {
    let mut style = Style::default();
    style.set_width(Dimension::Absolute(width));
    style.set_height(Dimension::Absolute(1));
    style.text_color = Rgba::opaque(fg);
    style.background_color = Rgba::opaque(bg);
    style
}

fn menu_row(world: &mut World, menu: NodeId, index: usize, label: &str) -> NodeId {
    let mut style = text_style(22, Rgb::new(220, 220, 220), Rgb::new(30, 30, 46));
    style.hover.background = Some(Rgba::opaque(Rgb::new(60, 60, 90)));
    style.focus.background = Some(Rgba::opaque(Rgb::new(90, 60, 120)));
    let row = world.attach(
        menu,
        Node::new(
            style,
            ElementKind::Text {
                content: label.to_string(),
            },
            format!("row-{index}"),
        ),
    );
    world.on(
        row,
        Criteria::KEY_PRESS,
        format!("row-{index}-keys"),
        Box::new(|ctx, record| {
            if record.data == b'q' {
                ctx.carry.terminate = true;
            }
            Ok(true)
        }),
    );
    row
}

fn build_demo(world: &mut World) {
    let Some(root) = world.root else {
        return;
    };

    {
        let node = world.tree.node_mut(root);
        node.style.border.set(true);
        node.style.title = "vitrail".into();
        node.style.background_color = Rgba::opaque(Rgb::new(18, 18, 28));
        node.style.border_color = Rgba::opaque(Rgb::new(140, 140, 170));
        node.style.border_background_color = Rgba::opaque(Rgb::new(18, 18, 28));
        node.fully_stain();
    }

    let mut menu_style = Style::default();
    menu_style.set_width(Dimension::Absolute(24));
    menu_style.set_height(Dimension::Absolute(8));
    menu_style.x.set(Dimension::Absolute(2));
    menu_style.y.set(Dimension::Absolute(2));
    menu_style.border.set(true);
    menu_style.title = "menu".into();
    menu_style.flow = FlowDirection::Column;
    menu_style.background_color = Rgba::opaque(Rgb::new(30, 30, 46));
    let menu = world.attach(
        root,
        Node::new(
            menu_style,
            ElementKind::ListView { scroll_index: 0 },
            "menu",
        ),
    );

    for (index, label) in [
        "stain tracking",
        "alpha compositing",
        "border stitching",
        "shadow pass",
        "scroll offsets",
        "memory tasks",
    ]
    .iter()
    .enumerate()
    {
        menu_row(world, menu, index, label);
    }

    let hint = text_style(40, Rgb::new(120, 120, 140), Rgb::new(18, 18, 28));
    let mut hint = Node::new(
        hint,
        ElementKind::Text {
            content: "tab cycles, enter selects, q quits".into(),
        },
        "hint",
    );
    hint.style.x.set(Dimension::Absolute(2));
    hint.style
        .y
        .set(Dimension::Absolute(world.max_height.max(2) as i32 - 2));
    world.attach(root, hint);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.logger_file_name.as_ref())?;
    let settings = args.to_settings();

    let mut engine = Engine::new(settings);
    engine.init().context("engine initialization failed")?;
    engine.pause_scope(build_demo);
    engine.update_frame();

    engine.wait();
    Ok(())
}
