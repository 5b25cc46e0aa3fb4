//! Host-side scenarios that drive a full `Device` through mock ports.

mod controller_flow_tests;
mod mock_hw;
mod settings_tests;
