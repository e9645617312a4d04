//! Sandbox runtime implementations.
//!
//! Three backends implement the [`Sandbox`](crate::runtime::Sandbox)
//! contract:
//!
//! - [`HostSandbox`] runs directly on the host under workspace
//!   containment,
//! - [`ContainerSandbox`] runs inside a reusable Docker container,
//! - [`UnavailableSandbox`] fails every operation with the error that
//!   prevented isolation from coming up.

pub mod container;
pub mod host;
pub mod unavailable;

pub use self::container::ContainerSandbox;
pub use self::host::HostSandbox;
pub use self::unavailable::UnavailableSandbox;
