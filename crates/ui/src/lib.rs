pub mod app;
pub mod state;
pub mod tasks;

pub use app::StoryGeneratorApp;
pub use tasks::{GenerateStoryCommand, TaskController, TaskEvent};

#[cfg(not(target_arch = "wasm32"))]
pub fn run() -> eframe::Result<()> {
    use eframe::NativeOptions;

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([760.0, 640.0]),
        centered: true,
        ..Default::default()
    };
    eframe::run_native(
        "AI Story Generator",
        options,
        Box::new(|cc| Box::new(StoryGeneratorApp::new(cc))),
    )
}
