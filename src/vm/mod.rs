// src/vm/mod.rs

//! Guest VM control.
//!
//! - [`controller`] is the narrow hypervisor capability (`VmController`) and
//!   its `VBoxManage` implementation.
//! - [`lifecycle`] powers a guest up/down idempotently and discovers its
//!   address.

pub mod controller;
pub mod lifecycle;

pub use controller::{PowerState, VBoxManage, VmController, GUEST_IPV4_PROPERTY};
pub use lifecycle::{AddressPolling, LifecyclePhase, VmLifecycle};
