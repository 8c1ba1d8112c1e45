use std::time::Instant;

use fire_timeline::map::{MapRenderer, Scene, Viewport};
use fire_timeline::session::{Command, Session};
use glam::DVec2;

/// Width of the side panel in characters, borders included
pub const PANEL_WIDTH: usize = 40;
/// Rows below the map: status line and timeline strip
pub const FOOTER_HEIGHT: usize = 2;

/// Application state
pub struct App {
    pub session: Session,
    pub scene: Scene,
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub should_quit: bool,
    pub show_panel: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    term_size: (usize, usize),
}

impl App {
    pub fn new(session: Session, width: usize, height: usize) -> Self {
        let (pw, ph) = map_dots(width, height, true);
        let viewport = Viewport::fit(&session.region().bounds, pw, ph);
        Self {
            session,
            scene: Scene::new(),
            viewport,
            map_renderer: MapRenderer::new(),
            should_quit: false,
            show_panel: true,
            last_mouse: None,
            mouse_pos: None,
            term_size: (width, height),
        }
    }

    pub fn start(&mut self) {
        self.session.start(&mut self.scene);
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.term_size = (width, height);
        let (pw, ph) = map_dots(width, height, self.show_panel);
        self.viewport.width = pw;
        self.viewport.height = ph;
    }

    /// Fit the current region on screen
    pub fn reset_view(&mut self) {
        let (pw, ph) = map_dots(self.term_size.0, self.term_size.1, self.show_panel);
        self.viewport = Viewport::fit(&self.session.region().bounds, pw, ph);
    }

    pub fn toggle_panel(&mut self) {
        self.show_panel = !self.show_panel;
        self.resize(self.term_size.0, self.term_size.1);
    }

    pub fn dispatch(&mut self, command: Command) {
        let before = self.session.region().name.clone();
        self.session.dispatch(command, Instant::now(), &mut self.scene);
        if self.session.region().name != before {
            self.reset_view();
        }
    }

    /// Playback tick plus any finished background fetches
    pub fn update(&mut self, now: Instant) {
        self.session.poll(&mut self.scene);
        self.session.tick(now, &mut self.scene);
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zoom towards a terminal column/row
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_dots(col, row);
        self.viewport.zoom_at(px, py, 1.5);
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_dots(col, row);
        self.viewport.zoom_at(px, py, 1.0 / 1.5);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn center_coords(&self) -> String {
        format_coords(DVec2::new(self.viewport.center_lon, self.viewport.center_lat))
    }

    /// Geographic position under the mouse, if it is over the map
    pub fn cursor_coords(&self) -> Option<DVec2> {
        let (px, py) = self.mouse_pixel_pos()?;
        let inside = px >= 0
            && py >= 0
            && (px as usize) < self.viewport.width
            && (py as usize) < self.viewport.height;
        inside.then(|| self.viewport.unproject(px, py))
    }

    /// Look up conditions at a terminal position
    pub fn inspect_at(&mut self, col: u16, row: u16) {
        self.set_mouse_pos(col, row);
        if let Some(p) = self.cursor_coords() {
            self.dispatch(Command::Inspect { lat: p.y, lon: p.x });
        }
    }

    /// Look up conditions at the map centre
    pub fn inspect_center(&mut self) {
        let (lat, lon) = (self.viewport.center_lat, self.viewport.center_lon);
        self.dispatch(Command::Inspect { lat, lon });
    }

    /// Pan by the drag distance since the last mouse event
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = (last_x as i32 - x as i32) * 2;
            let dy = (last_y as i32 - y as i32) * 4;
            self.pan(dx, dy);
        }
        self.last_mouse = Some((x, y));
    }

    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Mouse position in braille dots relative to the map interior
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| to_dots(col, row))
    }
}

/// Terminal cell to braille dot, accounting for the one-cell map border
fn to_dots(col: u16, row: u16) -> (i32, i32) {
    (
        (col.saturating_sub(1) as i32) * 2,
        (row.saturating_sub(1) as i32) * 4,
    )
}

/// Map interior size in dots for a terminal of `width` x `height` cells
fn map_dots(width: usize, height: usize, panel: bool) -> (usize, usize) {
    let panel = if panel { PANEL_WIDTH } else { 0 };
    let inner_width = width.saturating_sub(panel + 2);
    let inner_height = height.saturating_sub(FOOTER_HEIGHT + 2);
    (inner_width * 2, inner_height * 4)
}

pub fn format_coords(p: DVec2) -> String {
    format!(
        "{:.3}°{}, {:.3}°{}",
        p.y.abs(),
        if p.y >= 0.0 { "N" } else { "S" },
        p.x.abs(),
        if p.x >= 0.0 { "E" } else { "W" }
    )
}
