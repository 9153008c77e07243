#![allow(unreachable_code)]

use crate::event::Event;
use crate::signal::SimObject;
use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::value::Val;
use crate::{executor::JoinHandle, executor::Task, TbResult};
use std::collections::VecDeque;

/*
 * CLOCK / RESET
 */

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResetActiveLevel {
    Low,
    High,
}

/// Number of full clock cycles reset is held active after startup.
const RESET_CYCLES: u32 = 10;

/// Free-running clock with an initial reset pulse.
///
/// `start()` is meant to be forked and never returns: it asserts reset,
/// toggles the clock, releases reset after [`RESET_CYCLES`] cycles and fires
/// `event_end_reset` exactly once. The task runs until the test process
/// tears it down.
#[derive(Clone)]
pub struct ClockDomain {
    clk: SimObject,
    period: u64,
    unit: String,
    reset: Option<SimObject>,
    reset_level: ResetActiveLevel,
    pub event_end_reset: Event<()>,
}

impl ClockDomain {
    pub fn new(
        clk: SimObject,
        period: u64,
        unit: &str,
        reset: SimObject,
        reset_level: ResetActiveLevel,
    ) -> Self {
        Self {
            clk,
            period,
            unit: unit.to_string(),
            reset: Some(reset),
            reset_level,
            event_end_reset: Event::new(),
        }
    }

    /// Clock without a reset; `event_end_reset` still fires after
    /// [`RESET_CYCLES`] cycles so waiters have a common start point.
    pub fn without_reset(clk: SimObject, period: u64, unit: &str) -> Self {
        Self {
            clk,
            period,
            unit: unit.to_string(),
            reset: None,
            reset_level: ResetActiveLevel::Low,
            event_end_reset: Event::new(),
        }
    }

    fn reset_values(&self) -> (i32, i32) {
        match self.reset_level {
            ResetActiveLevel::Low => (0, 1),
            ResetActiveLevel::High => (1, 0),
        }
    }

    pub async fn start(self) -> TbResult {
        let high_t = self.period / 2;
        let low_t = self.period - high_t;
        if self.period % 2 != 0 {
            SIM_IF.log(&format!(
                "Warning: Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.",
                period = self.period,
                unit = self.unit,
                high = high_t,
                low = low_t
            ));
        }
        let (active, inactive) = self.reset_values();
        if let Some(reset) = self.reset {
            reset.set(active);
        }
        let mut cycles = 0u32;
        loop {
            self.clk.set(0);
            Trigger::timer(low_t, &self.unit).await;
            self.clk.set(1);
            Trigger::timer(high_t, &self.unit).await;
            cycles += 1;
            if cycles == RESET_CYCLES {
                if let Some(reset) = self.reset {
                    reset.set(inactive);
                }
                self.event_end_reset.set(());
            }
        }
        Ok(Val::None)
    }
}

/*
 * PAYLOAD TRANSACTIONS
 */

/// Payload snapshot captured from a channel, in field declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction(Vec<(String, u128)>);

impl Transaction {
    fn capture(fields: &[(String, SimObject)]) -> Self {
        Self(
            fields
                .iter()
                .map(|(name, sig)| (name.clone(), sig.u128()))
                .collect(),
        )
    }

    pub fn get(&self, field: &str) -> u128 {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .unwrap_or_else(|| panic!("Transaction has no field '{}'", field))
            .1
    }
}

fn lookup_payload(dut: SimObject, base: &str, fields: &[&str]) -> Vec<(String, SimObject)> {
    fields
        .iter()
        .map(|field| {
            (
                field.to_string(),
                dut.c(&format!("{}_payload_{}", base, field)),
            )
        })
        .collect()
}

/*
 * STREAM (valid/ready)
 */

/// Valid/ready handshake channel, driven by the testbench.
///
/// Signal names follow the flattened convention of the generated RTL:
/// `<base>_valid`, `<base>_ready`, `<base>_payload_<field>`. A channel
/// without a ready signal degrades to valid-only.
#[derive(Clone)]
pub struct Stream {
    pub valid: SimObject,
    pub ready: Option<SimObject>,
    fields: Vec<(String, SimObject)>,
}

impl Stream {
    pub fn new(dut: SimObject, base: &str, fields: &[&str]) -> Self {
        let valid = dut.c(&format!("{}_valid", base));
        let ready = dut.get_child(&format!("{}_ready", base)).ok();
        Self {
            valid,
            ready,
            fields: lookup_payload(dut, base, fields),
        }
    }

    /// Drives valid and all payload fields to zero.
    pub fn init(&self) {
        self.valid.set(0);
        for (_, sig) in &self.fields {
            sig.set_u128(0);
        }
    }

    pub fn payload(&self, field: &str) -> SimObject {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .unwrap_or_else(|| panic!("Stream has no payload field '{}'", field))
            .1
    }

    /// Sets the payload, then asserts valid.
    pub fn drive(&self, values: &[(&str, u128)]) {
        for (field, value) in values {
            self.payload(field).set_u128(*value);
        }
        self.valid.set(1);
    }

    /// Completes at the first rising clock edge where the transfer is
    /// accepted: valid high, and ready high if the channel has one.
    pub async fn accepted(&self, clk: SimObject) -> TbResult {
        loop {
            clk.rising_edge().await;
            if self.valid.u32() == 1 && self.ready.map_or(true, |r| r.u32() == 1) {
                break;
            }
        }
        Ok(Val::None)
    }
}

/*
 * FLOW (valid only, no backpressure)
 */

/// Valid-qualified channel observed by the testbench. The receiver cannot
/// stall the sender.
#[derive(Clone)]
pub struct Flow {
    pub valid: SimObject,
    fields: Vec<(String, SimObject)>,
    pub event_valid: Event<Transaction>,
}

impl Flow {
    pub fn new(dut: SimObject, base: &str, fields: &[&str]) -> Self {
        Self {
            valid: dut.c(&format!("{}_valid", base)),
            fields: lookup_payload(dut, base, fields),
            event_valid: Event::new(),
        }
    }

    pub fn payload(&self, field: &str) -> SimObject {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .unwrap_or_else(|| panic!("Flow has no payload field '{}'", field))
            .1
    }

    /// Forks a monitor that samples valid at every rising clock edge. The
    /// first edge with valid high captures the payload into `event_valid`.
    /// One capture per monitoring session: re-arm with
    /// `event_valid.clear()`. A second valid pulse while the event is still
    /// fired is a protocol violation and fails the running test.
    pub fn start_monitoring(&self, clk: SimObject) -> JoinHandle {
        Task::fork(self.clone().monitor(clk))
    }

    async fn monitor(self, clk: SimObject) -> TbResult {
        loop {
            clk.rising_edge().await;
            if self.valid.u32() == 1 {
                if self.event_valid.fired() {
                    SIM_IF.log("Flow: valid pulsed again before the monitor was re-armed");
                    crate::fail_test("unexpected second valid assertion on monitored flow");
                    return Err(Val::String("unexpected second valid assertion".to_string()));
                }
                self.event_valid.set(Transaction::capture(&self.fields));
            }
        }
        Ok(Val::None)
    }
}

/*
 * SCOREBOARD
 */

/// Compares expected against received transactions in arrival order.
pub struct Scoreboard<T>
where
    T: PartialEq,
{
    exp_q: VecDeque<T>,
    recv_q: VecDeque<T>,
    errors: u32,
    expected: u32,
    received: u32,
    matched: u32,
}

impl<T> Scoreboard<T>
where
    T: PartialEq,
{
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Scoreboard {
            exp_q: VecDeque::new(),
            recv_q: VecDeque::new(),
            errors: 0,
            expected: 0,
            received: 0,
            matched: 0,
        }
    }

    pub fn add_exp(&mut self, data: T) {
        self.exp_q.push_back(data);
        self.expected += 1;
        self.compare();
    }
    pub fn add_recv(&mut self, data: T) {
        self.recv_q.push_back(data);
        self.received += 1;
        self.compare();
    }

    fn compare(&mut self) {
        while !self.exp_q.is_empty() && !self.recv_q.is_empty() {
            match self.exp_q.pop_front() == self.recv_q.pop_front() {
                true => self.matched += 1,
                false => self.errors += 1,
            }
        }
    }

    pub fn result(&self) -> TbResult {
        match self.passed() {
            true => Ok(Val::String(self.result_str())),
            false => Err(Val::String(self.result_str())),
        }
    }

    pub fn result_str(&self) -> String {
        format!(
            "expected={}, received={}, matched={}, errors={}, expQ: {}, recvQ: {}",
            self.expected,
            self.received,
            self.matched,
            self.errors,
            self.exp_q.len(),
            self.recv_q.len()
        )
    }

    pub fn passed(&self) -> bool {
        self.expected > 0
            && self.received == self.expected
            && self.matched == self.received
            && self.errors == 0
            && self.exp_q.is_empty()
            && self.recv_q.is_empty()
    }

    pub fn pass_or_fail(&self) {
        if self.passed() {
            crate::pass_test(&self.result_str());
        } else {
            crate::fail_test(&self.result_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoreboard_matches_in_order() {
        let mut sb: Scoreboard<u128> = Scoreboard::new();
        sb.add_exp(0x3ad77bb40d7a3660a89ecaf32466ef97);
        sb.add_recv(0x3ad77bb40d7a3660a89ecaf32466ef97);
        assert!(sb.passed());
        assert!(sb.result().is_ok());
    }

    #[test]
    fn scoreboard_counts_mismatch_as_error() {
        let mut sb: Scoreboard<u32> = Scoreboard::new();
        sb.add_exp(1);
        sb.add_recv(2);
        assert!(!sb.passed());
        assert!(sb.result().is_err());
        assert!(sb.result_str().contains("errors=1"));
    }

    #[test]
    fn scoreboard_fails_on_unbalanced_queues() {
        let mut sb: Scoreboard<u32> = Scoreboard::new();
        sb.add_exp(1);
        sb.add_exp(2);
        sb.add_recv(1);
        // one expected transaction never arrived
        assert!(!sb.passed());

        let empty: Scoreboard<u32> = Scoreboard::new();
        assert!(!empty.passed());
    }
}
