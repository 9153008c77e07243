use crate::signal::ObjectKind;
use crate::SimpleResult;
use lazy_static::lazy_static;
use num_format::{Locale, ToFormattedString};

#[cfg(feature = "vpi")]
use crate::vpi;

#[cfg(not(feature = "vpi"))]
use crate::model;

lazy_static! {
    pub static ref SIM_IF: Box<dyn SimIf + Sync> = new_interface();
}

#[cfg(feature = "vpi")]
fn new_interface() -> Box<dyn SimIf + Sync> {
    Box::new(vpi::Vpi::new())
}
#[cfg(not(feature = "vpi"))]
fn new_interface() -> Box<dyn SimIf + Sync> {
    Box::new(model::ModelSim::new())
}

#[derive(Debug, Hash, Clone, Eq, PartialEq)]
pub enum SimCallback {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

pub trait SimIf {
    fn set_value_i32(&self, handle: usize, value: i32, force: bool) -> SimpleResult<()>;
    fn get_value_i32(&self, handle: usize) -> SimpleResult<i32>;
    fn set_value_bin(&self, handle: usize, value: String, force: bool) -> SimpleResult<()>;
    fn get_value_bin(&self, handle: usize) -> SimpleResult<String>;
    fn release(&self, handle: usize) -> SimpleResult<()>;
    fn get_handle_by_name(&self, name: &str) -> SimpleResult<usize>;
    fn get_root_handle(&self) -> SimpleResult<usize>;
    fn get_full_name(&self, handle: usize) -> SimpleResult<String>;
    fn get_size(&self, handle: usize) -> i32;
    fn get_kind(&self, handle: usize) -> ObjectKind;
    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);

    fn get_sim_time(&self, unit: &str) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        let precision = self.get_sim_precision();
        ldexp10(t, precision - time_scale(unit).unwrap())
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> u64 {
        let precision = self.get_sim_precision();
        let steps = ldexp10(time, time_scale(unit).unwrap() - precision);
        if steps % 1.0 == 0.0 {
            steps as u64
        } else {
            panic!(
                "Can't convert time {} {} to sim steps without rounding (sim precision: 1e{})",
                time, unit, precision
            );
        }
    }
}

// "123,456.789ns" prefix shared by the backends' log() implementations.
pub(crate) fn time_prefix(t_ns: f64) -> String {
    let int = t_ns.floor() as u64;
    let mut frac_str = format!("{:.3}", t_ns % 1.0);
    frac_str.remove(0);
    format!("{}{}ns", int.to_formatted_string(&Locale::en), frac_str)
}

fn time_scale(unit: &str) -> SimpleResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(()),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_scale_units() {
        assert_eq!(time_scale("ns"), Ok(-9));
        assert_eq!(time_scale("ps"), Ok(-12));
        assert_eq!(time_scale("sec"), Ok(0));
        assert!(time_scale("weeks").is_err());
    }

    #[test]
    fn ldexp10_scaling() {
        assert_eq!(ldexp10(1.5, 3), 1500.0);
        assert_eq!(ldexp10(1500.0, -3), 1.5);
        assert_eq!(ldexp10(42.0, 0), 42.0);
    }

    #[test]
    fn time_prefix_format() {
        assert_eq!(time_prefix(0.0), "0.000ns");
        assert_eq!(time_prefix(1234.5), "1,234.500ns");
    }
}
