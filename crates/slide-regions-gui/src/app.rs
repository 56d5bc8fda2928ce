use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use slide_regions::{InputEvent, KeyBindings, KeyCode, PointerKind};
use std::time::Duration;

use crate::backend::ViewerUpdate;
use crate::logger::AppLogger;

const LOG_LINES_SHOWN: usize = 50;

/// The viewer window. It only displays frames and forwards input; all
/// annotation state lives on the annotation thread.
pub struct AnnotatorApp {
    event_tx: Sender<InputEvent>,
    update_rx: Receiver<ViewerUpdate>,
    logger: AppLogger,
    key_hints: String,

    page_texture: Option<egui::TextureHandle>,
    /// Pixel size of the last frame
    page_size: egui::Vec2,
    /// Screen position of the press that started the current drag
    drag_start: Option<egui::Pos2>,
    finished: bool,
}

impl AnnotatorApp {
    pub fn new(
        event_tx: Sender<InputEvent>,
        update_rx: Receiver<ViewerUpdate>,
        logger: AppLogger,
        keys: &KeyBindings,
    ) -> Self {
        Self {
            event_tx,
            update_rx,
            logger,
            key_hints: key_hints(keys),
            page_texture: None,
            page_size: egui::Vec2::ZERO,
            drag_start: None,
            finished: false,
        }
    }

    fn send(&self, event: InputEvent) {
        // The annotation thread may already be gone after the last page
        let _ = self.event_tx.send(event);
    }

    fn apply_update(&mut self, ctx: &egui::Context, update: ViewerUpdate) {
        match update {
            ViewerUpdate::Title(title) => {
                ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
            }
            ViewerUpdate::Frame {
                width,
                height,
                rgba_data,
            } => {
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied([width, height], &rgba_data);
                if let Some(texture) = &mut self.page_texture {
                    texture.set(color_image, egui::TextureOptions::LINEAR);
                } else {
                    self.page_texture = Some(ctx.load_texture(
                        "slide_page",
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ));
                }
                self.page_size = egui::vec2(width as f32, height as f32);
            }
            ViewerUpdate::Finished => {
                self.finished = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Map a screen position inside `image_rect` to page pixel coordinates
    fn to_page(&self, pos: egui::Pos2, image_rect: egui::Rect) -> (i32, i32) {
        let scale_x = self.page_size.x / image_rect.width();
        let scale_y = self.page_size.y / image_rect.height();
        (
            ((pos.x - image_rect.min.x) * scale_x).round() as i32,
            ((pos.y - image_rect.min.y) * scale_y).round() as i32,
        )
    }

    fn forward_input(&mut self, ctx: &egui::Context, image_rect: Option<egui::Rect>) {
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    let Some(rect) = image_rect else {
                        continue;
                    };
                    if pressed && !rect.contains(pos) {
                        continue;
                    }
                    let (x, y) = self.to_page(pos, rect);
                    let kind = if pressed {
                        self.drag_start = Some(pos);
                        PointerKind::Press
                    } else {
                        self.drag_start = None;
                        PointerKind::Release
                    };
                    self.send(InputEvent::Pointer { kind, x, y });
                }
                egui::Event::PointerMoved(pos) if self.drag_start.is_some() => {
                    if let Some(rect) = image_rect {
                        let (x, y) = self.to_page(pos, rect);
                        self.send(InputEvent::Pointer {
                            kind: PointerKind::Move,
                            x,
                            y,
                        });
                    }
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    ..
                } => {
                    if let Some(code) = key_code(key) {
                        self.send(InputEvent::Key(code));
                    }
                }
                _ => {}
            }
        }
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(update) = self.update_rx.try_recv() {
            self.apply_update(ctx, update);
        }

        if !self.finished && ctx.input(|i| i.viewport().close_requested()) {
            self.send(InputEvent::Closed);
        }

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(&self.key_hints);
            if let Some(message) = self.logger.latest_message() {
                ui.separator();
                ui.label(message);
            }
            egui::CollapsingHeader::new("Log").show(ui, |ui| {
                egui::ScrollArea::vertical()
                    .max_height(150.0)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        let entries = self.logger.get_entries();
                        let skip = entries.len().saturating_sub(LOG_LINES_SHOWN);
                        for entry in entries.into_iter().skip(skip) {
                            ui.monospace(format!(
                                "{} {:<5} {}",
                                entry.timestamp.format("%H:%M:%S"),
                                entry.level,
                                entry.message
                            ));
                        }
                    });
            });
        });

        let mut image_rect = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.page_texture {
                let available = ui.available_size();
                let scale = (available.x / self.page_size.x).min(available.y / self.page_size.y);
                let size = self.page_size * scale;

                let response = ui.add(
                    egui::Image::from_texture(egui::load::SizedTexture::new(texture.id(), size))
                        .sense(egui::Sense::click_and_drag()),
                );
                image_rect = Some(response.rect);

                // Rubber band while dragging; the committed outline arrives with the next frame
                if let (Some(start), Some(now)) = (self.drag_start, ctx.pointer_latest_pos()) {
                    ui.painter().rect_stroke(
                        egui::Rect::from_two_pos(start, now),
                        0.0,
                        egui::Stroke::new(1.5, egui::Color32::from_rgb(0, 200, 0)),
                        egui::StrokeKind::Middle,
                    );
                }
            } else {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                    ui.label("Rendering page...");
                });
            }
        });

        self.forward_input(ctx, image_rect);

        // Frames arrive from another thread; keep polling for them
        ctx.request_repaint_after(Duration::from_millis(30));
    }
}

fn key_code(key: egui::Key) -> Option<KeyCode> {
    match key {
        egui::Key::Escape => Some(KeyCode::Escape),
        egui::Key::Enter => Some(KeyCode::Enter),
        egui::Key::Space => Some(KeyCode::Space),
        egui::Key::Backspace => Some(KeyCode::Backspace),
        egui::Key::ArrowLeft => Some(KeyCode::ArrowLeft),
        egui::Key::ArrowRight => Some(KeyCode::ArrowRight),
        egui::Key::ArrowUp => Some(KeyCode::ArrowUp),
        egui::Key::ArrowDown => Some(KeyCode::ArrowDown),
        other => other.name().parse().ok(),
    }
}

fn key_hints(keys: &KeyBindings) -> String {
    format!(
        "drag: draw box   {}: undo   {}: clear   {}: save & next   {}: save & back   {}: quit",
        keys.undo, keys.clear, keys.advance, keys.retreat, keys.cancel
    )
}
