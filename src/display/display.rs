//! SDL2 Window Display Module
//! One SDL2 window per name, keyboard commands and mouse-drag region
//! selection. Uses the sdl2 crate for window management and rendering.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use image::RgbImage;
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::mouse::MouseButton;
use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use tracing::{debug, info};

use crate::display::{Command, Display};
use crate::{HighlightError, Rect, Result};

struct WindowSlot {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    width: u32,
    height: u32,
}

/// SDL2 Window Display
/// Windows are created lazily on first `show` and sized to the frame.
pub struct Sdl2Display {
    video: sdl2::VideoSubsystem,
    event_pump: sdl2::EventPump,
    windows: HashMap<String, WindowSlot>,
    _sdl: sdl2::Sdl,
}

impl Sdl2Display {
    pub fn new() -> Result<Self> {
        let sdl = sdl2::init().map_err(HighlightError::display)?;
        let video = sdl.video().map_err(HighlightError::display)?;
        let event_pump = sdl.event_pump().map_err(HighlightError::display)?;

        info!("SDL2 display initialised");
        Ok(Self {
            video,
            event_pump,
            windows: HashMap::new(),
            _sdl: sdl,
        })
    }

    fn slot(&mut self, title: &str, width: u32, height: u32) -> Result<&mut WindowSlot> {
        let stale = self
            .windows
            .get(title)
            .map_or(false, |slot| (slot.width, slot.height) != (width, height));
        if stale {
            self.windows.remove(title);
        }

        if !self.windows.contains_key(title) {
            let window = self
                .video
                .window(title, width.max(1), height.max(1))
                .position_centered()
                .build()
                .map_err(|e| HighlightError::display(e.to_string()))?;
            let canvas = window
                .into_canvas()
                .present_vsync()
                .build()
                .map_err(|e| HighlightError::display(e.to_string()))?;
            let texture_creator = canvas.texture_creator();
            debug!("Created window {:?} ({}x{})", title, width, height);

            self.windows.insert(
                title.to_string(),
                WindowSlot {
                    canvas,
                    texture_creator,
                    width,
                    height,
                },
            );
        }

        self.windows
            .get_mut(title)
            .ok_or_else(|| HighlightError::display(format!("window {} unavailable", title)))
    }

    fn render(slot: &mut WindowSlot, image: &RgbImage, boxes: &[Rect]) -> Result<()> {
        let (width, height) = image.dimensions();
        let mut texture = slot
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(|e| HighlightError::display(e.to_string()))?;

        texture
            .update(None, image.as_raw(), (width * 3) as usize)
            .map_err(|e| HighlightError::display(e.to_string()))?;

        slot.canvas.clear();
        slot.canvas
            .copy(&texture, None, None)
            .map_err(HighlightError::display)?;

        slot.canvas.set_draw_color(Color::RGB(0, 255, 0));
        for bbox in boxes.iter().filter(|b| !b.is_empty()) {
            slot.canvas
                .draw_rect(sdl2::rect::Rect::new(bbox.x, bbox.y, bbox.width, bbox.height))
                .map_err(HighlightError::display)?;
        }
        slot.canvas.set_draw_color(Color::RGB(0, 0, 0));

        slot.canvas.present();
        Ok(())
    }

    fn command_for(event: &Event) -> Option<Command> {
        match event {
            Event::Quit { .. }
            | Event::Window {
                win_event: WindowEvent::Close,
                ..
            } => Some(Command::Quit),
            Event::KeyDown {
                keycode: Some(keycode),
                repeat: false,
                ..
            } => match *keycode {
                Keycode::Q | Keycode::Escape => Some(Command::Quit),
                Keycode::Space => Some(Command::Pause),
                Keycode::R => Some(Command::RewindToStart),
                Keycode::Z => Some(Command::RewindInterval),
                Keycode::P => Some(Command::SelectObjects),
                Keycode::S => Some(Command::ToggleRecording),
                Keycode::O => Some(Command::Snapshot),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Display for Sdl2Display {
    fn show(&mut self, window: &str, image: &RgbImage) -> Result<()> {
        let (width, height) = image.dimensions();
        let slot = self.slot(window, width, height)?;
        Self::render(slot, image, &[])
    }

    fn poll_input(&mut self, timeout: Duration) -> Option<Command> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = if remaining.is_zero() {
                self.event_pump.poll_event()?
            } else {
                let millis = remaining.as_millis().clamp(1, u32::MAX as u128) as u32;
                self.event_pump.wait_event_timeout(millis)?
            };

            if let Some(command) = Self::command_for(&event) {
                return Some(command);
            }
        }
    }

    fn select_regions(&mut self, window: &str, image: &RgbImage) -> Result<Vec<Rect>> {
        let (width, height) = image.dimensions();
        info!("Select regions: drag with the left button, Enter to confirm, Esc to cancel");

        let mut boxes: Vec<Rect> = Vec::new();
        let mut anchor: Option<(i32, i32)> = None;
        let mut current: Option<Rect> = None;

        Self::render(self.slot(window, width, height)?, image, &boxes)?;

        loop {
            let event = self.event_pump.wait_event();
            let mut dirty = false;

            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => return Ok(Vec::new()),
                Event::KeyDown {
                    keycode: Some(Keycode::Return | Keycode::KpEnter | Keycode::Space),
                    ..
                } => break,
                Event::KeyDown {
                    keycode: Some(Keycode::Backspace),
                    ..
                } => {
                    boxes.pop();
                    dirty = true;
                }
                Event::MouseButtonDown {
                    mouse_btn: MouseButton::Left,
                    x,
                    y,
                    ..
                } => {
                    anchor = Some((x, y));
                }
                Event::MouseMotion { x, y, .. } => {
                    if let Some(start) = anchor {
                        current = Some(Rect::from_corners(start, (x, y)));
                        dirty = true;
                    }
                }
                Event::MouseButtonUp {
                    mouse_btn: MouseButton::Left,
                    x,
                    y,
                    ..
                } => {
                    if let Some(start) = anchor.take() {
                        let bbox = Rect::from_corners(start, (x, y));
                        if let Some(bbox) = bbox.clamp_to(width, height) {
                            boxes.push(bbox);
                        }
                        current = None;
                        dirty = true;
                    }
                }
                _ => {}
            }

            if dirty {
                let mut shown = boxes.clone();
                shown.extend(current);
                Self::render(self.slot(window, width, height)?, image, &shown)?;
            }
        }

        info!("Selected {} regions", boxes.len());
        Ok(boxes)
    }

    fn close_window(&mut self, window: &str) {
        if self.windows.remove(window).is_some() {
            debug!("Closed window {:?}", window);
        }
    }
}
