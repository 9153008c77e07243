#![allow(clippy::result_unit_err)]

use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::SimpleResult;
use intmap::IntMap;
use lazy_mut::lazy_mut;
use std::collections::HashMap;

lazy_mut! {
    static mut SIG_MAP_NAME: HashMap<String, usize> = HashMap::new();
}
lazy_mut! {
    // key is signal handle as u64
    static mut SIG_MAP: IntMap<SimObject> = IntMap::new();
}

// The model backend re-creates all handles between runs, so the lookup
// caches must be dropped with them.
pub(crate) fn clear_sig_maps() {
    unsafe {
        *SIG_MAP_NAME = HashMap::new();
        *SIG_MAP = IntMap::new();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug)]
pub enum ObjectKind {
    Int(i32),
    Real,
    Array(i32),
    Hier,
    Other,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> String {
        SIM_IF
            .get_full_name(self.handle)
            .expect("Couldn't get name of SimObject")
    }

    pub fn size(&self) -> i32 {
        match self.kind {
            ObjectKind::Int(size) | ObjectKind::Array(size) => size,
            _ => panic!("SimObject does not have a size."),
        }
    }

    pub fn is_modifiable(&self) -> bool {
        !matches!(self.kind, ObjectKind::Other)
    }

    pub fn has_value(&self) -> bool {
        !matches!(self.kind, ObjectKind::Other)
    }

    #[allow(clippy::needless_question_mark)]
    pub fn get_child(&self, name: &str) -> SimpleResult<Self> {
        let mut child_name = self.name();
        child_name.push('.');
        child_name.push_str(name);
        Ok(SimObject::from_name(child_name.as_str())?)
    }

    #[allow(clippy::clone_on_copy)]
    pub fn from_handle(handle: usize) -> SimpleResult<Self> {
        if let Some(signal) = unsafe { SIG_MAP.get_mut(handle as u64) } {
            Ok(signal.clone())
        } else {
            Err(())
        }
    }

    pub fn from_name(full_name: &str) -> SimpleResult<Self> {
        let handle = unsafe { SIG_MAP_NAME.get_mut(full_name) }.map(|h| h.to_owned());
        match handle {
            Some(h) => SimObject::from_handle(h),
            _ => Ok(SimObject::new_from_name(full_name)?),
        }
    }

    fn new_from_name(full_name: &str) -> SimpleResult<Self> {
        let handle = SIM_IF.get_handle_by_name(full_name)?;
        Ok(SimObject::new_from_handle(handle))
    }

    pub(crate) fn new_from_handle(handle: usize) -> Self {
        let signal = SimObject {
            handle,
            kind: SIM_IF.get_kind(handle),
        };
        unsafe {
            SIG_MAP.insert(handle as u64, signal);
            SIG_MAP_NAME.insert(signal.name(), handle);
        };
        signal
    }

    pub fn get_root() -> SimpleResult<Self> {
        let handle = SIM_IF.get_root_handle()?;
        match SimObject::from_handle(handle) {
            Ok(root) => Ok(root),
            _ => Ok(SimObject::new_from_handle(handle)),
        }
    }

    pub fn i32(&self) -> i32 {
        SIM_IF.get_value_i32(self.handle).unwrap()
    }

    pub fn u32(&self) -> u32 {
        let val = SIM_IF.get_value_i32(self.handle).unwrap();
        val as u32
    }

    pub fn u128(&self) -> u128 {
        let bin = self.bin();
        match bin_to_u128(&bin) {
            Some(val) => val,
            None => panic!("Can't read {} as u128: {}", self.name(), bin),
        }
    }

    pub fn bin(&self) -> String {
        SIM_IF.get_value_bin(self.handle).unwrap()
    }

    pub fn c(&self, name: &str) -> Self {
        self.get_child(name)
            .unwrap_or_else(|_| panic!("Could not get object with name {}.{}", self.name(), name))
    }

    pub fn release(&self) {
        SIM_IF.release(self.handle).unwrap();
    }

    pub fn set(&self, val: i32) {
        self._set_i32(val, false)
    }

    pub fn force(&self, val: i32) {
        self._set_i32(val, true)
    }

    pub fn set_u32(&self, val: u32) {
        self._set_i32(val as i32, false)
    }

    pub fn set_u128(&self, val: u128) {
        let size = match self.kind {
            ObjectKind::Int(size) => size,
            _ => panic!("Can't set {} using set_u128()", self.name()),
        };
        SIM_IF
            .set_value_bin(self.handle, u128_to_bin(val, size as u32), false)
            .unwrap();
    }

    #[inline]
    fn _set_i32(&self, val: i32, force: bool) {
        assert!(
            matches!(self.kind, ObjectKind::Int(_)),
            "Can't set signal {} of kind {:?} using integer type.",
            self.name(),
            self.kind
        );
        assert!(self.size() <= 32, "Maximum size is 32 bit for set()/force().");
        SIM_IF.set_value_i32(self.handle, val, force).unwrap();
    }

    pub fn set_bin(&self, val: &str) {
        self._set_bin(val, false)
    }

    pub fn force_bin(&self, val: &str) {
        self._set_bin(val, true)
    }

    #[inline]
    fn _set_bin(&self, val: &str, force: bool) {
        // remove '_' and 0b
        let size = match self.kind {
            ObjectKind::Int(size) => size,
            _ => panic!("Can't set {} using set_bin()", self.name()),
        };
        let stripped = val.replace("0b", "");
        let stripped = stripped.replace('_', "");
        if stripped.len() == size as usize {
            let is_valid = stripped.chars().all(valid_char);
            if is_valid {
                SIM_IF.set_value_bin(self.handle, stripped, force).unwrap();
            } else {
                panic!("Can't set {} to {}. Invalid characters.", self.name(), val);
            }
        } else {
            panic!("Can't set {} to {}. Length mismatch.", self.name(), val);
        }
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

fn valid_char(c: char) -> bool {
    let l = c.to_ascii_lowercase();
    l == '0' || l == '1' || l == 'z' || l == 'x'
}

pub fn u128_to_bin(value: u128, width: u32) -> String {
    assert!(width >= 1 && width <= 128, "Bit width must be 1..=128.");
    if width < 128 {
        assert!(
            value >> width == 0,
            "Value 0x{:x} does not fit into {} bits.",
            value,
            width
        );
    }
    (0..width)
        .rev()
        .map(|i| if value >> i & 1 == 1 { '1' } else { '0' })
        .collect()
}

pub fn bin_to_u128(bin: &str) -> Option<u128> {
    if bin.is_empty() || bin.len() > 128 {
        return None;
    }
    let mut value: u128 = 0;
    for c in bin.chars() {
        value = match c {
            '0' => value << 1,
            '1' => value << 1 | 1,
            // x/z bits leave the word undefined
            _ => return None,
        };
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_round_trip() {
        let key: u128 = 0x2b7e151628aed2a6abf7158809cf4f3c;
        let bin = u128_to_bin(key, 128);
        assert_eq!(bin.len(), 128);
        assert_eq!(bin_to_u128(&bin), Some(key));
    }

    #[test]
    fn bin_narrow_widths() {
        assert_eq!(u128_to_bin(1, 1), "1");
        assert_eq!(u128_to_bin(0, 1), "0");
        assert_eq!(u128_to_bin(0b1010, 4), "1010");
        assert_eq!(u128_to_bin(5, 8), "00000101");
    }

    #[test]
    #[should_panic]
    fn bin_value_too_wide() {
        u128_to_bin(4, 2);
    }

    #[test]
    fn bin_undefined_bits() {
        assert_eq!(bin_to_u128("1x0"), None);
        assert_eq!(bin_to_u128("zz"), None);
        assert_eq!(bin_to_u128(""), None);
        assert_eq!(bin_to_u128("101"), Some(5));
    }
}
