use anyhow::Context as _;
use clap::Parser;
use eframe::egui;

use sam_annotate::{logger, AnnotateApp, Config};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logger::init(config.verbose);
    config.validate().context("invalid configuration")?;

    let title = match config.image.as_ref().and_then(|p| p.file_name()) {
        Some(name) => format!("sam-annotate - {}", name.to_string_lossy()),
        None => "sam-annotate".to_string(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_drag_and_drop(true)
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(AnnotateApp::new(&config)?))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run eframe: {e}"))
}
