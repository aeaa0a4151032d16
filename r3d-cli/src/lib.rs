/// Terminal preview of meshes and shared helpers for the `r3d` binary
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use nalgebra::{Matrix4, Rotation3, Vector3};
use r3d_core::{Aabb, Camera, Mesh, ProjectionMode};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Candidate meshes are drawn in this colour
pub const CANDIDATE_COLOR: Color = Color::Cyan;
/// Ground-truth meshes are drawn in this colour
pub const GROUND_TRUTH_COLOR: Color = Color::Green;

/// A mesh and the colour it is drawn in
pub struct Layer {
    pub mesh: Mesh,
    pub color: Color,
}

impl Layer {
    pub fn new(mesh: Mesh, color: Color) -> Self {
        Self { mesh, color }
    }
}

/// Interactive terminal viewer for one or more meshes
pub struct PreviewApp {
    layers: Vec<Layer>,
    caption: String,
    bounds: Aabb,
    yaw: f32,
    pitch: f32,
    spin: bool,
    camera: Camera,
    renderer: AsciiRenderer,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl PreviewApp {
    /// Frame every layer in a `width` x `height` character view.
    ///
    /// The first row is kept for the caption.
    pub fn new(layers: Vec<Layer>, caption: impl Into<String>, width: u16, height: u16) -> r3d_core::Result<Self> {
        let mut bounds: Option<Aabb> = None;
        for layer in &layers {
            let b = layer.mesh.bounds()?;
            bounds = Some(match bounds {
                Some(acc) => acc.merge(&b),
                None => b,
            });
        }
        let bounds = bounds.ok_or(r3d_core::R3dError::EmptyMesh)?;
        let (width, height) = (width.max(1), height.saturating_sub(1).max(1));

        Ok(Self {
            layers,
            caption: caption.into(),
            camera: Camera::framing(&bounds, width as u32, height as u32),
            renderer: AsciiRenderer::new(width as usize, height as usize),
            bounds,
            yaw: 0.0,
            pitch: 0.0,
            spin: true,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        })
    }

    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.pitch += pitch;
        self.yaw += yaw;
    }

    /// Rotation about the centre of the framed bounds
    fn model_matrix(&self) -> Matrix4<f32> {
        let c = self.bounds.center();
        let center = Vector3::new(c.x as f32, c.y as f32, c.z as f32);
        let rotation = Rotation3::from_euler_angles(self.pitch, 0.0, self.yaw).to_homogeneous();
        Matrix4::new_translation(&center) * rotation * Matrix4::new_translation(&-center)
    }

    fn draw_layers(&mut self) {
        let model = self.model_matrix();
        self.renderer.clear();
        for layer in &self.layers {
            self.renderer.render_mesh(&layer.mesh, &model, &self.camera, layer.color);
        }
    }

    /// One frame as plain text, caption first
    pub fn snapshot(&mut self) -> String {
        self.draw_layers();
        format!("{}\n{}", self.caption, self.renderer.to_text())
    }

    pub fn run(&mut self) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        let view_height = height.saturating_sub(1).max(1);
        self.camera = Camera::framing(&self.bounds, width as u32, view_height as u32);
        self.renderer = AsciiRenderer::new(width as usize, view_height as usize);

        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30);

        while self.running {
            let frame_start = Instant::now();

            if event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            if self.spin {
                self.rotate(0.0, 0.015);
            }

            self.render()?;

            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        if let Event::Key(KeyEvent { code, .. }) = event::read()? {
            match code {
                KeyCode::Char('q') | KeyCode::Esc => self.running = false,
                KeyCode::Char('w') | KeyCode::Up => self.rotate(0.1, 0.0),
                KeyCode::Char('s') | KeyCode::Down => self.rotate(-0.1, 0.0),
                KeyCode::Char('a') | KeyCode::Left => self.rotate(0.0, -0.1),
                KeyCode::Char('d') | KeyCode::Right => self.rotate(0.0, 0.1),
                KeyCode::Char(' ') => self.spin = !self.spin,
                KeyCode::Char('p') => {
                    self.camera.mode = match self.camera.mode {
                        ProjectionMode::Perspective => ProjectionMode::Orthographic,
                        ProjectionMode::Orthographic => ProjectionMode::Perspective,
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn render(&mut self) -> io::Result<()> {
        self.draw_layers();

        let mut stdout = stdout();
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "{} | FPS: {:.1} | WASD/Arrows=Rotate Space=Spin P=Projection Q=Quit",
                self.caption, self.fps
            )),
            terminal::Clear(terminal::ClearType::UntilNewLine),
            ResetColor,
            cursor::MoveTo(0, 1)
        )?;
        self.renderer.draw(&mut stdout)?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_has_caption_and_both_layers() {
        let mut gt = Mesh::cube(1.0);
        gt.translate(&Vector3::new(-1.0, 0.0, 0.0));
        let mut candidate = Mesh::cube(1.0);
        candidate.translate(&Vector3::new(1.0, 0.0, 0.0));

        let mut app = PreviewApp::new(
            vec![Layer::new(candidate, CANDIDATE_COLOR), Layer::new(gt, GROUND_TRUTH_COLOR)],
            "SDF error 0.0123",
            60,
            25,
        )
        .unwrap();
        let text = app.snapshot();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "SDF error 0.0123");
        assert_eq!(rows.len(), 25);

        // Both cubes sit on the middle row, one either side of the centre
        let middle: Vec<char> = rows[12].chars().collect();
        assert!(middle[..30].iter().any(|&c| c != ' '));
        assert!(middle[30..].iter().any(|&c| c != ' '));
    }

    #[test]
    fn test_empty_layers_are_rejected() {
        assert!(PreviewApp::new(Vec::new(), "", 10, 10).is_err());
        assert!(PreviewApp::new(vec![Layer::new(Mesh::new(), CANDIDATE_COLOR)], "", 10, 10).is_err());
    }
}
