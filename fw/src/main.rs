/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains the main entry point for the PQSM firmware image.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(feature = "std"), no_main)]

use pqsm_drivers::cprintln;
use pqsm_drivers::{
    Accelerator, Dilithium, ScratchBuffer, ScratchMem, SeedSource, Server, ServerBuffers, Uart,
};
use pqsm_registers::dilithium::DilithiumReg;

#[cfg(feature = "std")]
pub fn main() {}

const BANNER: &str = r#"
Running PQSM firmware ...
"#;

static mut SCRATCH: ScratchMem = ScratchMem::new();
static mut BUFS: ServerBuffers = ServerBuffers::new();

#[no_mangle]
pub extern "C" fn entry_point() -> ! {
    cprintln!("{}", BANNER);

    // One handle each; this is the only place they are created.
    let mut accel_reg = unsafe { DilithiumReg::new() };
    let accel = Accelerator::new(accel_reg.regs_mut());
    let scratch = ScratchBuffer::from_mem(unsafe { &mut *core::ptr::addr_of_mut!(SCRATCH) });
    let dilithium = Dilithium::new(accel, scratch);
    let bufs = unsafe { &mut *core::ptr::addr_of_mut!(BUFS) };
    let mut server = Server::new(Uart::new(), dilithium, bufs, SeedSource::HostLink);

    // SYNC is answered with READY, START runs one command exchange; a
    // desynchronized session is dropped and the host starts over.
    loop {
        let _ = server.process_one();
    }
}

#[cfg(not(feature = "std"))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
