use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use eframe::egui::{self, Color32, RichText};
use story_core::{LogLevel, LogRecord};

use crate::state::{document_lines, AppState, DocumentLine, Notice, IDEA_HINT};
use crate::tasks::{TaskController, TaskEvent};

const APP_TITLE: &str = "AI Story Generator";
const APP_DESCRIPTION: &str =
    "Describe the story you want, and the AI will create it step by step!";

pub struct StoryGeneratorApp {
    state: AppState,
    tasks: TaskController,
}

impl StoryGeneratorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self::with_config_path(PathBuf::from("config.json"))
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        let state = match AppState::new(config_path.clone()) {
            Ok(state) => state,
            Err(err) => {
                log::warn!("failed to load {}: {err}", config_path.display());
                let mut state = AppState::with_defaults(config_path);
                state.notice = Some(Notice::Error(format!(
                    "Failed to load configuration: {err}. Using defaults."
                )));
                state
            }
        };

        Self {
            state,
            tasks: TaskController::new(),
        }
    }

    fn handle_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Log(record) => self.state.push_log(record),
            TaskEvent::Started => self
                .state
                .push_log(LogRecord::info("Crafting your story...")),
            TaskEvent::Finished(result) => {
                if let Err(err) = &result {
                    self.state
                        .push_log(LogRecord::new(LogLevel::Error, err.to_string()));
                }
                self.state.finish_generation(result);
            }
        }
    }

    fn generate(&mut self) {
        let command = match self.state.prepare_generation(|name| std::env::var(name).ok()) {
            Ok(command) => command,
            Err(err) => {
                self.state.reject(&err);
                return;
            }
        };

        let profile_name = command.profile_name.clone();
        match self.tasks.send(command) {
            Ok(()) => self.state.start_generation(&profile_name),
            Err(err) => {
                self.state.notice = Some(Notice::Error(format!("Failed to start generation: {err}")))
            }
        }
    }

    fn save_document(&mut self) {
        let Some(document) = &self.state.document else {
            return;
        };
        let Some(path) = rfd::FileDialog::new()
            .set_file_name("story.md")
            .add_filter("Markdown", &["md"])
            .save_file()
        else {
            return;
        };

        self.state.notice = Some(match fs::write(&path, document.render()) {
            Ok(()) => Notice::Info(format!("Story saved to {}", path.display())),
            Err(err) => Notice::Error(format!("Failed to save {}: {err}", path.display())),
        });
    }

    fn show_form(&mut self, ui: &mut egui::Ui) {
        ui.heading(APP_TITLE);
        ui.label(APP_DESCRIPTION);
        ui.add_space(8.0);

        let busy = self.state.is_busy();
        let response = ui.add_enabled(
            !busy,
            egui::TextEdit::singleline(&mut self.state.idea)
                .hint_text(IDEA_HINT)
                .desired_width(f32::INFINITY),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        ui.horizontal(|ui| {
            let clicked = ui
                .add_enabled(!busy, egui::Button::new("Generate Story"))
                .clicked();
            if (clicked || submitted) && !busy {
                self.generate();
            }

            let profiles = self.state.llm_profiles();
            if profiles.len() > 1 {
                let selected = self.state.selected_llm.clone().unwrap_or_default();
                egui::ComboBox::from_label("LLM profile")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for name in profiles {
                            let is_selected = self.state.selected_llm.as_ref() == Some(&name);
                            if ui.selectable_label(is_selected, &name).clicked() {
                                self.state.selected_llm = Some(name);
                            }
                        }
                    });
            }

            if self.state.is_busy() {
                ui.spinner();
                ui.label("Crafting your story...");
            }
        });

        if let Some(notice) = &self.state.notice {
            match notice {
                Notice::Info(message) => ui.colored_label(Color32::LIGHT_BLUE, message),
                Notice::Warning(message) => ui.colored_label(Color32::YELLOW, message),
                Notice::Error(message) => ui.colored_label(Color32::RED, message),
            };
        }
    }

    fn show_document(&mut self, ui: &mut egui::Ui) {
        let Some(document) = &self.state.document else {
            return;
        };
        let rendered = document.render();

        ui.horizontal(|ui| {
            ui.strong("Your story");
            if ui.button("Save…").clicked() {
                self.save_document();
            }
        });

        egui::ScrollArea::vertical()
            .id_source("story_document")
            .auto_shrink([false, true])
            .max_height(ui.available_height() * 0.7)
            .show(ui, |ui| {
                for line in document_lines(&rendered) {
                    match line {
                        DocumentLine::Heading(text) => {
                            ui.label(RichText::new(text).heading());
                        }
                        DocumentLine::Text(text) => {
                            ui.label(text);
                        }
                        DocumentLine::Blank => ui.add_space(6.0),
                    }
                }
            });
    }

    fn show_logs(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new(format!("Logs ({})", self.state.logs.len()))
            .default_open(false)
            .show(ui, |ui| {
                if ui.button("Clear").clicked() {
                    self.state.logs.clear();
                }
                egui::ScrollArea::vertical()
                    .id_source("story_logs")
                    .max_height(200.0)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for record in self.state.logs.iter() {
                            let color = match record.level {
                                LogLevel::Error => Color32::RED,
                                LogLevel::Warn => Color32::YELLOW,
                                LogLevel::Info => Color32::LIGHT_GREEN,
                                LogLevel::Debug => Color32::LIGHT_BLUE,
                                LogLevel::Trace => Color32::GRAY,
                            };
                            ui.colored_label(
                                color,
                                format!("[{}] {}", record.level, record.message),
                            );
                        }
                    });
            });
    }
}

impl eframe::App for StoryGeneratorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Some(event) = self.tasks.try_recv() {
            self.handle_event(event);
        }

        egui::TopBottomPanel::bottom("log_panel").show(ctx, |ui| self.show_logs(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_form(ui);
            ui.separator();
            self.show_document(ui);
        });

        if self.state.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
