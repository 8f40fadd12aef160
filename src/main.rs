// =============================================================================
// VULKAN BOOTSTRAP - Window, device, swapchain and a presented triangle
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (App)                                         │
// │    └── Bootstrap<AshApi>                                        │
// │          ├── instance, debug report, surface, device            │
// │          ├── swapchain, views, render pass, pipeline, FBs       │
// │          ├── pre-recorded command buffers                       │
// │          └── frame sync slots (semaphores + fences)             │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Wait for the slot's fence
// 2. Acquire swapchain image
// 3. Submit the image's pre-recorded commands
// 4. Present
//
// EXIT CODES: 0 success, -1 error, -2 panic
//
// =============================================================================

mod backend;
mod config;
mod logging;

use anyhow::{Context, Result};
use backend::{AshApi, Bootstrap, BootstrapSettings, FrameStatus, ShaderPaths, SurfaceTarget};
use config::Config;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::panic;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

const EXIT_ERROR: i32 = -1;
const EXIT_PANIC: i32 = -2;

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    let code = match panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            report(&format!("Fatal error: {:#}", e));
            EXIT_ERROR
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            report(&format!("Panic: {}", message));
            EXIT_PANIC
        }
    };

    std::process::exit(code);
}

/// Log a fatal message, or print it if logging never came up
fn report(message: &str) {
    if log::max_level() == log::LevelFilter::Off {
        eprintln!("{}", message);
    } else {
        log::error!("{}", message);
    }
}

fn run() -> Result<()> {
    let (config, config_error) = Config::load();

    if let Err(e) = logging::init(&config.debug) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }
    if let Some(e) = config_error {
        log::warn!("Failed to load {}: {:#}. Using defaults.", config::CONFIG_PATH, e);
    }

    log::info!("Starting Vulkan bootstrap");
    log::info!(
        "Window: {}x{}, variant {:?}, selection {:?}",
        config.window.width,
        config.window.height,
        config.graphics.variant,
        config.graphics.selection
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The bootstrap owns the surface,
/// so it must go before the window it was created from.
struct App {
    config: Config,
    bootstrap: Option<Bootstrap<AshApi>>,
    window: Option<Arc<Window>>,
    /// First unrecoverable error; ends the event loop
    fatal: Option<anyhow::Error>,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let now = Instant::now();
        Self {
            config,
            bootstrap: None,
            window: None,
            fatal: None,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    /// Run every bootstrap stage against the new window
    fn init_vulkan(&self, window: &Window) -> Result<Bootstrap<AshApi>> {
        let size = window.inner_size();
        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();
        let target = SurfaceTarget::new(display, handle, size.width, size.height);

        let shaders = ShaderPaths::locate(&self.config.shaders);
        log::info!(
            "Shaders: {} / {}",
            shaders.vertex.display(),
            shaders.fragment.display()
        );
        let settings = BootstrapSettings::from_config(&self.config, shaders);

        let api = AshApi::load()?;
        Bootstrap::new(api, settings, target)
    }

    /// Record the first fatal error, tear down and leave the event loop
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Bootstrap drop waits for idle and destroys in reverse order
        self.bootstrap = None;
        event_loop.exit();
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        match self.init_vulkan(&window) {
            Ok(bootstrap) => {
                if let Some(chain) = bootstrap.swapchain_resources() {
                    log::info!(
                        "Ready: {} swapchain images, {} frames in flight",
                        chain.image_count(),
                        bootstrap.frame_slots().len()
                    );
                }
                self.bootstrap = Some(bootstrap);
            }
            Err(e) => {
                self.fail(event_loop, e.context("Failed to initialize Vulkan"));
                return;
            }
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::Destroyed => {
                log::info!("Window destroyed");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(size) => {
                if let Some(bootstrap) = self.bootstrap.as_mut() {
                    bootstrap.resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(bootstrap) = self.bootstrap.as_mut() else {
                    return;
                };
                match bootstrap.draw_frame() {
                    Ok(FrameStatus::Presented { .. }) => self.update_fps(),
                    Ok(FrameStatus::Skipped) => {}
                    Err(e) => self.fail(event_loop, e.context("Render error")),
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.bootstrap.is_some() {
            if let Some(ref window) = self.window {
                window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.bootstrap = None;
    }
}
