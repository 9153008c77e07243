use std::ffi::{CStr, CString};

use crate::signal::ObjectKind;
use crate::sim_if::{time_prefix, SimCallback, SimIf};
use crate::trigger::{self, EdgeKind};
use crate::vpi_user;
use crate::SimpleResult;

pub(crate) struct Vpi {
    precision: i8,
}

impl Vpi {
    pub(crate) fn new() -> Self {
        Vpi {
            precision: get_time_precision(),
        }
    }

    #[inline]
    unsafe fn _register_callback(
        &self,
        reason: i32,
        mut time: vpi_user::t_vpi_time,
        mut value: vpi_user::t_vpi_value,
        sig_hdl: vpi_user::vpiHandle,
        cb_fun: unsafe extern "C" fn(*mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32,
    ) -> usize {
        let mut cb_data = vpi_user::t_cb_data {
            reason,
            cb_rtn: Some(cb_fun),
            obj: sig_hdl,
            value: &mut value,
            time: &mut time,
            ..Default::default()
        };
        vpi_user::vpi_register_cb(&mut cb_data) as usize
    }
}

impl SimIf for Vpi {
    fn set_value_i32(&self, handle: usize, value: i32, force: bool) -> SimpleResult<()> {
        let mut val = vpi_user::t_vpi_value {
            format: vpi_user::vpiIntVal as i32,
            value: vpi_user::t_vpi_value_union { integer: value },
        };
        let mut time = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            ..Default::default()
        };
        let mut flag = vpi_user::vpiInertialDelay as i32;
        if force {
            flag = vpi_user::vpiForceFlag as i32;
        }
        unsafe {
            vpi_user::vpi_put_value(
                handle as vpi_user::vpiHandle,
                &mut val,
                &mut time,
                flag,
            );
        };
        Ok(())
    }

    fn get_value_i32(&self, handle: usize) -> SimpleResult<i32> {
        unsafe {
            let mut val = vpi_user::t_vpi_value {
                format: vpi_user::vpiIntVal as i32,
                value: vpi_user::t_vpi_value_union { integer: 0 },
            };
            vpi_user::vpi_get_value(handle as vpi_user::vpiHandle, &mut val);
            if val.format == vpi_user::vpiIntVal as i32 {
                Ok(val.value.integer)
            } else {
                Err(())
            }
        }
    }

    fn set_value_bin(&self, handle: usize, value: String, force: bool) -> SimpleResult<()> {
        let mut val = value;
        val.push('\0');
        let mut val = vpi_user::t_vpi_value {
            format: vpi_user::vpiBinStrVal as i32,
            value: vpi_user::t_vpi_value_union {
                str_: val.as_mut_ptr() as *mut vpi_user::PLI_BYTE8,
            },
        };
        let mut time = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            ..Default::default()
        };
        let mut flag = vpi_user::vpiInertialDelay as i32;
        if force {
            flag = vpi_user::vpiForceFlag as i32;
        }
        unsafe {
            vpi_user::vpi_put_value(handle as vpi_user::vpiHandle, &mut val, &mut time, flag);
        };
        Ok(())
    }

    fn get_value_bin(&self, handle: usize) -> SimpleResult<String> {
        unsafe {
            let mut val = vpi_user::t_vpi_value {
                format: vpi_user::vpiBinStrVal as i32,
                value: vpi_user::t_vpi_value_union { integer: 0 },
            };
            vpi_user::vpi_get_value(handle as vpi_user::vpiHandle, &mut val);
            if val.format == vpi_user::vpiBinStrVal as i32 {
                let s = CStr::from_ptr(check_null(val.value.str_)?)
                    .to_owned()
                    .into_string()
                    .unwrap();
                Ok(s)
            } else {
                Err(())
            }
        }
    }

    fn release(&self, handle: usize) -> SimpleResult<()> {
        let mut val = vpi_user::t_vpi_value {
            format: vpi_user::vpiIntVal as i32,
            value: vpi_user::t_vpi_value_union { integer: 0 },
        };
        unsafe {
            vpi_user::vpi_put_value(
                handle as vpi_user::vpiHandle,
                &mut val,
                std::ptr::null_mut(),
                vpi_user::vpiReleaseFlag as i32,
            );
        };
        Ok(())
    }

    fn get_handle_by_name(&self, name: &str) -> SimpleResult<usize> {
        let name_string = CString::new(name).map_err(|_| ())?;
        let hdl = unsafe {
            vpi_user::vpi_handle_by_name(
                name_string.as_ptr() as *mut vpi_user::PLI_BYTE8,
                std::ptr::null_mut(),
            ) as usize
        };
        if hdl == 0 {
            self.log(&format!("Couldn't get handle from name {}", name));
            Err(())
        } else {
            Ok(hdl)
        }
    }

    fn get_root_handle(&self) -> SimpleResult<usize> {
        let iterator = unsafe {
            vpi_user::vpi_iterate(vpi_user::vpiModule as i32, std::ptr::null_mut())
        };
        if iterator.is_null() {
            return Err(());
        }
        let root = unsafe { vpi_user::vpi_scan(iterator) };
        if root.is_null() {
            return Err(());
        }
        if !unsafe { vpi_user::vpi_scan(iterator).is_null() } {
            unsafe { vpi_user::vpi_free_object(iterator) };
        }
        Ok(root as usize)
    }

    fn get_full_name(&self, handle: usize) -> SimpleResult<String> {
        unsafe {
            let ptr = vpi_user::vpi_get_str(
                vpi_user::vpiFullName as i32,
                handle as vpi_user::vpiHandle,
            );
            let s = CStr::from_ptr(check_null(ptr)?)
                .to_owned()
                .into_string()
                .unwrap();
            Ok(s)
        }
    }

    fn get_size(&self, handle: usize) -> i32 {
        unsafe { vpi_user::vpi_get(vpi_user::vpiSize as i32, handle as vpi_user::vpiHandle) }
    }

    fn get_kind(&self, handle: usize) -> ObjectKind {
        let t = get_kind_raw(handle);
        match t as u32 {
            vpi_user::vpiRealVar | vpi_user::vpiShortRealVar => ObjectKind::Real,
            vpi_user::vpiNet
            | vpi_user::vpiReg
            | vpi_user::vpiIntegerVar
            | vpi_user::vpiBitVar
            | vpi_user::vpiLongIntVar
            | vpi_user::vpiIntVar => ObjectKind::Int(self.get_size(handle)),
            vpi_user::vpiModule => ObjectKind::Hier,
            _ => ObjectKind::Other,
        }
    }

    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize> {
        let hdl = match cb {
            SimCallback::Time(t) => {
                let time = vpi_user::t_vpi_time {
                    type_: vpi_user::vpiSimTime as i32,
                    high: (t >> 32) as u32,
                    low: (t & 0xFFFF_FFFF) as u32,
                    ..Default::default()
                };
                let value = vpi_user::t_vpi_value {
                    format: vpi_user::vpiSuppressVal as i32,
                    ..Default::default()
                };
                unsafe {
                    self._register_callback(
                        vpi_user::cbAfterDelay as i32,
                        time,
                        value,
                        std::ptr::null_mut(),
                        react_vpi_time,
                    )
                }
            }
            SimCallback::Edge(sig_hdl) => {
                let time = vpi_user::t_vpi_time {
                    type_: vpi_user::vpiSuppressTime as i32,
                    ..Default::default()
                };
                let value = vpi_user::t_vpi_value {
                    format: vpi_user::vpiIntVal as i32,
                    ..Default::default()
                };
                unsafe {
                    self._register_callback(
                        vpi_user::cbValueChange as i32,
                        time,
                        value,
                        sig_hdl as vpi_user::vpiHandle,
                        react_vpi_edge,
                    )
                }
            }
            SimCallback::ReadWrite => {
                let time = vpi_user::t_vpi_time {
                    type_: vpi_user::vpiSuppressTime as i32,
                    ..Default::default()
                };
                let value = vpi_user::t_vpi_value {
                    format: vpi_user::vpiSuppressVal as i32,
                    ..Default::default()
                };
                unsafe {
                    self._register_callback(
                        vpi_user::cbReadWriteSynch as i32,
                        time,
                        value,
                        std::ptr::null_mut(),
                        react_vpi_rw,
                    )
                }
            }
            SimCallback::ReadOnly => {
                let time = vpi_user::t_vpi_time {
                    type_: vpi_user::vpiSuppressTime as i32,
                    ..Default::default()
                };
                let value = vpi_user::t_vpi_value {
                    format: vpi_user::vpiSuppressVal as i32,
                    ..Default::default()
                };
                unsafe {
                    self._register_callback(
                        vpi_user::cbReadOnlySynch as i32,
                        time,
                        value,
                        std::ptr::null_mut(),
                        react_vpi_ro,
                    )
                }
            }
        };
        if hdl == 0 {
            Err(())
        } else {
            Ok(hdl)
        }
    }

    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()> {
        match unsafe { vpi_user::vpi_remove_cb(cb_hdl as vpi_user::vpiHandle) } {
            1 => Ok(()),
            _ => Err(()),
        }
    }

    fn get_sim_time_steps(&self) -> u64 {
        let mut time_obj = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            ..Default::default()
        };
        unsafe {
            vpi_user::vpi_get_time(std::ptr::null_mut(), &mut time_obj);
        }
        ((time_obj.high as u64) << 32) + time_obj.low as u64
    }

    fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    fn log(&self, msg: &str) {
        let line = format!("{} {}", time_prefix(self.get_sim_time("ns")), msg);
        if let Ok(c_line) = CString::new(line) {
            unsafe {
                vpi_user::vpi_printf(b"%s\n\0".as_ptr() as *const vpi_user::PLI_BYTE8, c_line.as_ptr());
            }
        }
    }
}

#[no_mangle]
pub(crate) extern "C" fn react_vpi_edge(
    cb_data: *mut vpi_user::t_cb_data,
) -> vpi_user::PLI_INT32 {
    let hdl = unsafe { (*cb_data).obj as usize };
    let mut edge = EdgeKind::Any;
    if crate::sim_if::SIM_IF.get_size(hdl) == 1 {
        unsafe {
            if !(*cb_data).value.is_null() {
                edge = match (*(*cb_data).value).value.integer {
                    0 => EdgeKind::Falling,
                    _ => EdgeKind::Rising,
                }
            }
        };
    }
    trigger::react(SimCallback::Edge(hdl), Some(edge));
    0
}

#[no_mangle]
pub(crate) extern "C" fn react_vpi_time(
    cb_data: *mut vpi_user::t_cb_data,
) -> vpi_user::PLI_INT32 {
    // the simulator reports the absolute time the callback fired at
    let t = unsafe { (u64::from((*(*cb_data).time).high) << 32) + u64::from((*(*cb_data).time).low) };
    trigger::react(SimCallback::Time(t), None);
    0
}

#[no_mangle]
pub(crate) extern "C" fn react_vpi_ro(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    trigger::react(SimCallback::ReadOnly, None);
    0
}

#[no_mangle]
pub(crate) extern "C" fn react_vpi_rw(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    trigger::react(SimCallback::ReadWrite, None);
    0
}

fn get_time_precision() -> i8 {
    let mut precision = unsafe {
        vpi_user::vpi_get(vpi_user::vpiTimePrecision as i32, std::ptr::null_mut())
    };
    if precision > 2 {
        precision = 2;
    }
    if precision < -15 {
        precision = -15;
    }
    precision as i8
}

pub fn get_kind_raw(handle: usize) -> i32 {
    unsafe { vpi_user::vpi_get(vpi_user::vpiType as i32, handle as vpi_user::vpiHandle) }
}

fn check_null<T>(ptr: *mut T) -> SimpleResult<*mut T> {
    if ptr.is_null() {
        Err(())
    } else {
        Ok(ptr)
    }
}

/// Registers the given test functions with the simulator: emits the
/// `vlog_startup_routines` table the simulator scans when it loads this
/// library, and hooks start/end of simulation.
#[macro_export]
macro_rules! run_with_vpi {
    ($( $i:ident ),+) => {
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static vlog_startup_routines: [Option<extern "C" fn()>; 2] =
            [Some(vpi_entry_point), None];

        #[no_mangle]
        pub extern "C" fn vpi_entry_point() {
            let _ = $crate::CRATE_NAME.set(std::module_path!().to_string());
            let mut tests = $crate::test::TbTests::new();
            $(tests.push($crate::test::Test::new(
                stringify!($i).to_string(),
                |sim_root| $crate::futures::future::FutureExt::boxed($i(sim_root)),
            ));)+
            $crate::vpi::vpi_init(tests);
        }
    }
}

pub fn vpi_init(tests: crate::test::TbTests) {
    crate::test::set_tests(tests);

    unsafe {
        let mut cb_data = vpi_user::t_cb_data {
            reason: vpi_user::cbStartOfSimulation as i32,
            cb_rtn: Some(vpi_start_of_simulation),
            ..Default::default()
        };
        vpi_user::vpi_register_cb(&mut cb_data);
    };
    unsafe {
        let mut cb_data = vpi_user::t_cb_data {
            reason: vpi_user::cbEndOfSimulation as i32,
            cb_rtn: Some(vpi_end_of_simulation),
            ..Default::default()
        };
        vpi_user::vpi_register_cb(&mut cb_data);
    };
}

#[no_mangle]
unsafe extern "C" fn vpi_start_of_simulation(
    _cb_data: *mut vpi_user::t_cb_data,
) -> vpi_user::PLI_INT32 {
    crate::start_of_simulation();
    0
}

#[no_mangle]
unsafe extern "C" fn vpi_end_of_simulation(
    _cb_data: *mut vpi_user::t_cb_data,
) -> vpi_user::PLI_INT32 {
    crate::end_of_simulation();
    0
}
