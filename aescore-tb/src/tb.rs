use simtb::prelude::*;

/// IO bundle of the AES core: a valid/ready command stream carrying
/// {block, key, enc} into the core and a valid-only response flow carrying
/// the processed block back.
pub struct AesCoreTb {
    pub cmd: Stream,
    pub rsp: Flow,
    pub clk: SimObject,
    pub resetn: SimObject,
}

impl AesCoreTb {
    pub fn new(dut: SimObject) -> Self {
        Self {
            cmd: Stream::new(dut, "io_crypto_cmd", &["block", "key", "enc"]),
            rsp: Flow::new(dut, "io_crypto_rsp", &["block"]),
            clk: dut.c("clk"),
            resetn: dut.c("resetn"),
        }
    }

    /// Drives command valid and all payload fields to zero.
    pub fn init(&self) {
        self.cmd.init();
    }
}
