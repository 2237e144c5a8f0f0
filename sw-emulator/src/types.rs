/*++

Licensed under the Apache-2.0 license.

File Name:

    types.rs

Abstract:

    File contains types shared by the emulator bus and peripherals.

--*/

/// RISCV Data width
pub type RvData = u32;

/// RISCV Address width
pub type RvAddr = u32;

/// RISCV IO Operation size
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum RvSize {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}
