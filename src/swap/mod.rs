//! The swap engine: per-direction state machine (`fsm`), the in-memory
//! registry (`index`), and the four direction wrappers (`wrapper`).

pub mod fsm;
pub mod index;
pub mod wrapper;
