use crate::color::Rgb;
use crate::config::{Config, MorphTarget};
use crate::error::Result;
use crate::graphics::{dim, downsample, draw_image_fit, FrameBuffer};
use crate::interaction::Affordance;
use crate::music::Music;
use crate::photos::{collect_photos, ImageRef, ThreadedLoader, TextureLoader};
use crate::scene::{Scene, Viewport, BACKGROUND};
use crate::state::{AppState, ViewedPhoto};
use crate::terminal::{present, terminal_size, TerminalGuard};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use glam::Vec2;
use log::{debug, info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

/// Margin, in frame pixels, around the photo viewer
const VIEWER_MARGIN: usize = 2;
const VIEWER_DIM: f32 = 0.25;

/// Interactive tree view bound to the terminal
pub struct TreeWidget<L: TextureLoader = ThreadedLoader> {
    scene: Scene,
    loader: L,
    config: Config,
    state: AppState,
    frames_since_last_update: usize,
    last_fps_calculation: Instant,
    fps: f64,
    /// Is the user currently dragging to orbit?
    dragging: bool,
    /// Last mouse position, in render pixels
    last_mouse_pos: Vec2,
    /// Terminal size as (columns, rows)
    size: (u16, u16),
    music: Music,
}

impl<L: TextureLoader> TreeWidget<L> {
    pub fn new(config: Config, photos: Vec<ImageRef>, mut loader: L, size: (u16, u16)) -> Self {
        let scene = Scene::new(&config, photos, &mut loader);
        let music = Music::load(config.music.as_deref());
        TreeWidget {
            scene,
            loader,
            config,
            state: AppState::default(),
            frames_since_last_update: 0,
            last_fps_calculation: Instant::now(),
            fps: 0.0,
            dragging: false,
            last_mouse_pos: Vec2::ZERO,
            size,
            music,
        }
    }

    /// Replaces the background track
    pub fn with_music(mut self, music: Music) -> Self {
        self.music = music;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn music(&self) -> &Music {
        &self.music
    }

    /// Render resolution in pixels; the bottom row is kept for the status line
    pub fn render_size(&self) -> (usize, usize) {
        let (cols, rows) = self.size;
        let ratio = self.config.pixel_ratio;
        let width = usize::from(cols.max(1)) * ratio;
        let height = usize::from(rows.saturating_sub(1).max(1)) * 2 * ratio;
        (width, height)
    }

    fn viewport(&self) -> Viewport {
        let (width, height) = self.render_size();
        Viewport::new(width, height)
    }

    /// Maps a terminal cell to the centre of its top pixel in render space
    fn cell_to_pixel(&self, column: u16, row: u16) -> Vec2 {
        let ratio = self.config.pixel_ratio as f32;
        Vec2::new(
            (f32::from(column) + 0.5) * ratio,
            (f32::from(row) * 2.0 + 0.5) * ratio,
        )
    }

    /// Handle one terminal event
    pub fn event(&mut self, event: &Event) {
        match event {
            Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
                self.key(key_event);
            }
            Event::Mouse(mouse_event) => self.mouse(mouse_event),
            Event::Resize(cols, rows) => {
                debug!("terminal resized to {cols}x{rows}");
                self.size = (*cols, *rows);
            }
            _ => {}
        }
    }

    fn key(&mut self, key_event: &KeyEvent) {
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key_event.code == KeyCode::Char('c') {
            self.state.quit = true;
            return;
        }
        match key_event.code {
            KeyCode::Esc | KeyCode::Enter if self.state.viewing.is_some() => {
                self.state.viewing = None;
            }
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                ' ' | 't' => {
                    let target = self.scene.toggle();
                    info!("morph target: {target:?}");
                }
                'd' => self.state.debug = !self.state.debug,
                'p' => {
                    self.state.paused = !self.state.paused;
                    // Drop any drag that was in progress
                    self.dragging = false;
                }
                'm' => {
                    let playing = self.music.toggle();
                    debug!("music playing: {playing}");
                }
                'r' => self.scene.reset_camera(),
                'u' => self.rescan_photos(),
                'q' => self.state.quit = true,
                _ => {}
            },
            _ => {}
        }
    }

    fn mouse(&mut self, mouse_event: &MouseEvent) {
        let pos = self.cell_to_pixel(mouse_event.column, mouse_event.row);
        let viewport = self.viewport();
        match mouse_event.kind {
            MouseEventKind::Moved => {
                if let Some(affordance) = self.scene.pointer_moved(pos, viewport) {
                    self.state.affordance = affordance;
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if self.state.viewing.is_some() {
                    self.state.viewing = None;
                    return;
                }
                match self.scene.click(pos, viewport) {
                    Some(image) => self.open_viewer(image),
                    None => {
                        self.dragging = true;
                        self.last_mouse_pos = pos;
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.dragging && !self.state.paused => {
                self.scene.orbit(pos - self.last_mouse_pos, viewport);
                self.last_mouse_pos = pos;
            }
            MouseEventKind::Up(MouseButton::Left) => self.dragging = false,
            _ => {}
        }
    }

    fn open_viewer(&mut self, image: ImageRef) {
        let texture = self
            .scene
            .board()
            .slots()
            .iter()
            .find(|slot| slot.loaded_image() == Some(&image))
            .and_then(|slot| slot.texture().cloned());
        if let Some(texture) = texture {
            info!("viewing {image}");
            self.state.viewing = Some(ViewedPhoto { image, texture });
        }
    }

    /// Re-reads the photo sources and rebinds the slots
    pub fn rescan_photos(&mut self) {
        match collect_photos(&self.config.photos, self.config.photo_dir.as_deref()) {
            Ok(photos) => {
                info!("rescanned photos: {} found", photos.len());
                self.scene.set_photos(photos, &mut self.loader);
            }
            Err(e) => warn!("photo rescan failed: {e}"),
        }
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.scene.pump_textures(&mut self.loader);
        if !self.state.paused {
            self.scene.advance(dt);
        }
    }

    /// Status line text
    pub fn status(&self) -> String {
        let greeting = match self.scene.target() {
            MorphTarget::Tree => "Merry Christmas!",
            MorphTarget::Scattered => "Make a wish \u{2728}",
        };
        let mut status = format!(" {greeting}  [space] morph  [u] photos  [q] quit");
        if self.music.has_track() {
            status.push_str("  [m] music");
        }
        if self.music.is_playing() {
            status.push_str(" \u{266A}");
        }
        if self.state.paused {
            status.push_str("  Paused");
        }
        if self.state.debug {
            let engine = self.scene.engine();
            let camera = self.scene.camera();
            let loaded = self.scene.board().slots().iter().filter(|s| s.is_loaded()).count();
            status.push_str(&format!(
                "  {} v{}  FPS: {:.2}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                self.fps
            ));
            for group in engine.groups() {
                status.push_str(&format!(
                    "  {}: {:.2}",
                    group.name(),
                    group.transition().progress()
                ));
            }
            status.push_str(&format!(
                "  photos: {}/{}  camera: {:.2}/{:.2}",
                loaded,
                self.scene.board().slots().len(),
                camera.azimuth,
                camera.polar,
            ));
        }
        if self.state.affordance == Affordance::Pointer {
            status.push_str("  (click to view)");
        }
        status
    }

    /// Paint the scene to `out`
    pub fn paint<W: Write>(&mut self, out: &mut W) -> Result<()> {
        // Update FPS calculation
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let duration = now.duration_since(self.last_fps_calculation);
        if duration.as_secs_f64() >= 1.0 {
            self.fps = self.frames_since_last_update as f64 / duration.as_secs_f64();
            self.frames_since_last_update = 0;
            self.last_fps_calculation = now;
        }

        let (width, height) = self.render_size();
        let mut frame = FrameBuffer::new(width, height, Rgb::hex(BACKGROUND));
        self.scene.render(&mut frame);
        let mut frame = downsample(&frame, self.config.pixel_ratio);

        if let Some(viewed) = &self.state.viewing {
            dim(&mut frame, VIEWER_DIM);
            draw_image_fit(&mut frame, &viewed.texture, VIEWER_MARGIN);
        }

        present(out, &frame, &self.status())
    }

    /// Tear down hover state, textures and music before the widget goes away
    pub fn teardown(&mut self) {
        self.state.affordance = self.scene.teardown();
        self.state.viewing = None;
        self.music.stop();
    }
}

/// Waits up to `timeout` for the next terminal event
pub fn terminal_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Drives `widget` until the user quits or an error occurs.
///
/// The widget is torn down on every exit path.
pub fn session<L, W, P>(
    widget: &mut TreeWidget<L>,
    out: &mut W,
    frame_time: Duration,
    poll: P,
) -> Result<()>
where
    L: TextureLoader,
    W: Write,
    P: FnMut(Duration) -> Result<Option<Event>>,
{
    let result = event_loop(widget, out, frame_time, poll);
    if let Err(e) = &result {
        warn!("event loop stopped: {e}");
    }
    widget.teardown();
    result
}

fn event_loop<L, W, P>(
    widget: &mut TreeWidget<L>,
    out: &mut W,
    frame_time: Duration,
    mut poll: P,
) -> Result<()>
where
    L: TextureLoader,
    W: Write,
    P: FnMut(Duration) -> Result<Option<Event>>,
{
    let mut last_tick = Instant::now();
    while !widget.state().quit {
        let deadline = last_tick + frame_time;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            let Some(event) = poll(timeout)? else {
                break;
            };
            widget.event(&event);
            if widget.state().quit {
                break;
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;
        widget.tick(dt);
        widget.paint(out)?;
    }
    Ok(())
}

/// Runs the interactive loop until the user quits
pub fn run(config: Config, photos: Vec<ImageRef>) -> Result<()> {
    let frame_time = Duration::from_secs_f32(config.frame_time());
    let size = terminal_size();
    let mut widget = TreeWidget::new(config, photos, ThreadedLoader::new(), size);
    let _guard = TerminalGuard::enter()?;
    let mut stdout = std::io::stdout();
    session(&mut widget, &mut stdout, frame_time, terminal_event)?;
    info!("bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use crate::music::Track;
    use crate::photos::SyncLoader;
    use crossterm::event::KeyEventState;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<&'static str>>>);

    impl Track for Recorder {
        fn play(&mut self) {
            self.0.borrow_mut().push("play");
        }

        fn pause(&mut self) {
            self.0.borrow_mut().push("pause");
        }
    }

    fn widget() -> TreeWidget<SyncLoader> {
        let config = Config {
            ornaments: 50,
            photo_slots: 4,
            spiral_stars: 20,
            backdrop_stars: 10,
            ..Config::default()
        };
        TreeWidget::new(config, Vec::new(), SyncLoader::new(), (40, 13))
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn space_toggles_target() {
        let mut widget = widget();
        assert_eq!(widget.scene().target(), MorphTarget::Tree);
        widget.event(&key(KeyCode::Char(' ')));
        assert_eq!(widget.scene().target(), MorphTarget::Scattered);
        assert!(widget.status().contains("Make a wish"));
        widget.event(&key(KeyCode::Char('t')));
        assert_eq!(widget.scene().target(), MorphTarget::Tree);
        assert!(widget.status().contains("Merry Christmas!"));
    }

    #[test]
    fn pause_freezes_simulation() {
        let mut widget = widget();
        widget.event(&key(KeyCode::Char('p')));
        let before = widget.scene().engine().time();
        widget.tick(0.5);
        assert_eq!(widget.scene().engine().time(), before);
        assert!(widget.status().contains("Paused"));
    }

    #[test]
    fn quit_keys() {
        let mut widget = widget();
        widget.event(&key(KeyCode::Char('q')));
        assert!(widget.state().quit);

        let mut widget = self::widget();
        widget.event(&Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(widget.state().quit);
    }

    #[test]
    fn render_size_leaves_status_row() {
        let widget = widget();
        assert_eq!(widget.render_size(), (40, 24));
    }

    #[test]
    fn paint_writes_frame() {
        let mut widget = widget();
        widget.tick(1.0 / 60.0);
        let mut out = Vec::new();
        widget.paint(&mut out).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn m_toggles_music() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut widget = widget().with_music(Music::with_track(Box::new(Recorder(calls.clone()))));
        assert!(widget.status().contains("[m] music"));

        widget.event(&key(KeyCode::Char('m')));
        assert!(widget.music().is_playing());
        assert!(widget.status().contains('\u{266A}'));

        widget.event(&key(KeyCode::Char('m')));
        assert!(!widget.music().is_playing());

        widget.event(&key(KeyCode::Char('m')));
        widget.teardown();
        assert!(!widget.music().is_playing());
        assert_eq!(*calls.borrow(), vec!["pause", "play", "pause", "play", "pause"]);
    }

    #[test]
    fn m_without_track_is_ignored() {
        let mut widget = widget();
        widget.event(&key(KeyCode::Char('m')));
        assert!(!widget.music().is_playing());
        assert!(!widget.status().contains("[m] music"));
    }

    #[test]
    fn session_tears_down_after_error() {
        let mut widget = widget();
        widget.tick(0.0);
        assert!(widget.scene().board().slots().iter().any(|s| s.is_loaded()));

        let mut out = Vec::new();
        let result = session(&mut widget, &mut out, Duration::ZERO, |_| {
            Err(TreeError::Terminal("input closed".to_string()))
        });
        assert!(matches!(result, Err(TreeError::Terminal(_))));
        assert!(widget.scene().board().slots().iter().all(|s| !s.is_loaded()));
        assert_eq!(widget.state().affordance, Affordance::Default);
    }

    #[test]
    fn session_ends_on_quit_key() {
        let mut widget = widget();
        let mut out = Vec::new();
        let mut events = vec![key(KeyCode::Char('q'))].into_iter();
        let result = session(&mut widget, &mut out, Duration::ZERO, |_| Ok(events.next()));
        assert!(result.is_ok());
        assert!(widget.state().quit);
        assert!(widget.scene().board().slots().iter().all(|s| !s.is_loaded()));
    }
}
