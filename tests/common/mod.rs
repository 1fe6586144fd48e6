#![allow(dead_code)]
#![allow(unused_imports)]

pub use action_graph_test_utils::builders;
pub use action_graph_test_utils::probes;
pub use action_graph_test_utils::{init_tracing, wait_for_state, with_timeout};
