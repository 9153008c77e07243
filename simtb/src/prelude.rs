pub use crate::event::Event;
pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::SimObject;
pub use crate::sim_if::SIM_IF;
pub use crate::tb_obj::{TbObj, TbObjSafe};
pub use crate::test::{TbTests, Test};
pub use crate::testbench::{ClockDomain, Flow, ResetActiveLevel, Scoreboard, Stream, Transaction};
pub use crate::trigger::Trigger;
pub use crate::value::Val;
pub use crate::{fail_test, pass_test, utils, SimpleResult, TbResult};
pub use futures::future::FutureExt;
