//! Merchant onboarding: a step-table dialog interpreter
//!
//! The flow is a static ordered table of steps; the interpreter renders a
//! step's prompt and widget from the accumulated draft, parses each
//! incoming answer, and either advances or re-prompts. The draft is
//! persisted after every step so registration survives restarts. The same
//! per-step validation serves edit mode, where one accepted answer writes
//! straight to the merchant record instead of advancing.

pub mod draft;
pub mod flow;
pub mod steps;

pub use draft::Draft;
pub use flow::{FlowAction, Outcome, StepView, Widget};
pub use steps::{step, StepDef, STEP_CONFIRM, STEP_FIRST, STEP_MEDIA};
