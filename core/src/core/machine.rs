/// Describes a single input button that a machine accepts.
pub struct InputButton {
    /// Machine-defined button identifier, passed to `set_input()`.
    pub id: u8,
    /// Human-readable name for display/configuration (e.g., "P1 Left", "Start").
    pub name: &'static str,
}

/// Machine-agnostic interface for emulated systems.
///
/// The driver calls [`run_frame`](Machine::run_frame) once per display frame
/// and hands the result of [`render_frame`](Machine::render_frame) to
/// whatever presentation surface it owns. The machine never presents
/// anything itself.
pub trait Machine {
    /// Native display resolution as (width, height) in pixels.
    fn display_size(&self) -> (u32, u32);

    /// Run one frame: CPU boards, video, sound, and any persistence hooks,
    /// in the machine's fixed order.
    fn run_frame(&mut self);

    /// Copy the most recent raster into an RGB24 pixel buffer.
    ///
    /// The buffer must be at least `width * height * 3` bytes (from `display_size()`).
    /// Pixels are stored left-to-right, top-to-bottom, 3 bytes per pixel (R, G, B).
    fn render_frame(&self, buffer: &mut [u8]);

    /// Handle an input event. `button` is a machine-defined ID from `input_map()`.
    /// `pressed` is true for key-down, false for key-up.
    ///
    /// Events are queued and folded into the hardware inputs at the start
    /// of the next `run_frame()`.
    fn set_input(&mut self, button: u8, pressed: bool);

    /// Get the list of input buttons this machine accepts.
    fn input_map(&self) -> &[InputButton];

    /// Reset the machine to its initial power-on state. Firmware stays loaded.
    fn reset(&mut self);
}
