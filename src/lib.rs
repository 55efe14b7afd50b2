//! Robogo - vision-guided goal pursuit for a small wheeled robot
//!
//! A camera frame goes to a vision-language model, the model's five-line
//! advice is parsed into an observation, and a rule-based selector turns
//! that into timed motor commands. Everything the robot decides is spoken.
//!
//! # Modules
//!
//! - `pursuit` - advice parser, action selector and the step loop driver
//! - `vision` - frames, the Gemini client and the retry wrapper
//! - `camera` - frame sources (synthetic, directory replay)
//! - `actuator` - motor control (simulated, line-command device)
//! - `narration` - speech output
//! - `metrics` - Prometheus metrics
//! - `tracing` - log and OTLP trace setup
//!
//! # Quick Start
//!
//! ```ignore
//! use robogo::{MockCamera, SimulatedActuator, ConsoleNarrator, PursuitConfig, PursuitDriver};
//!
//! let mut driver = PursuitDriver::new(
//!     Box::new(MockCamera::default()),
//!     Box::new(model),
//!     Arc::new(ConsoleNarrator),
//!     Box::new(SimulatedActuator::new()),
//!     PursuitConfig::default(),
//! );
//! let report = driver.pursue("red ball").await?;
//! ```

pub mod actuator;
pub mod camera;
pub mod metrics;
pub mod narration;
pub mod pursuit;
pub mod tracing;
pub mod vision;

// Re-export commonly used types at crate root for convenience
pub use actuator::{Actuator, DeviceActuator, Direction, SimulatedActuator};
pub use camera::{Camera, DirectoryCamera, MockCamera};
pub use narration::{CommandNarrator, ConsoleNarrator, Narrator};
pub use pursuit::{PursuitConfig, PursuitDriver, PursuitError, PursuitReport};
pub use vision::{Frame, GeminiClient, GeminiConfig, RetryingModel, VisionModel};
