//! # Module interface
//!
//! Components of the cockpit which run once per cycle (e.g. the control mixer, which runs once
//! per dispatch tick) implement [`State`]. The trait keeps the per-cycle logic free of threads and
//! transports so it can be driven directly in tests.

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Internal state of a cyclically processed module.
pub trait State {
    /// Data needed to initialise the module.
    type InitData;
    type InitError;

    /// Data the module consumes each cycle.
    type InputData;
    /// Data the module produces each cycle.
    type OutputData;
    /// Diagnostic report produced alongside the output each cycle.
    type StatusReport;
    type ProcError;

    /// Initialise, or reinitialise, the module. Any state from previous cycles is discarded.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Run one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
