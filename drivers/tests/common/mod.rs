// Licensed under the Apache-2.0 license

// Shared by multiple integration-test targets; not every target uses every
// helper.
#![allow(dead_code)]

use pqsm_drivers::{Accelerator, Dilithium, ScratchBuffer, ScratchMem};
use pqsm_emu::{BusMmio, DilithiumModel, DILITHIUM_MODEL_ADDR};
use pqsm_registers::dilithium::RegisterBlock;
use std::cell::RefCell;
use std::rc::Rc;

pub type ModelMmio = BusMmio<Rc<RefCell<DilithiumModel>>>;

/// Spin budget for tests; the model completes transfers synchronously, so
/// exhausting this means a deliberately stalled channel.
pub const TEST_SPIN_BUDGET: u32 = 10_000;

/// The emulated SoC: accelerator model plus the scratch memory the DMA
/// channels target.
pub struct HwModel {
    pub accel: Rc<RefCell<DilithiumModel>>,
    scratch: Box<ScratchMem>,
}

impl HwModel {
    pub fn new() -> Self {
        Self {
            accel: Rc::new(RefCell::new(DilithiumModel::new())),
            scratch: Box::new(ScratchMem::new()),
        }
    }

    /// Builds the driver stack over the model, exactly as the firmware
    /// builds it over hardware.
    pub fn dilithium(&mut self) -> Dilithium<'_, ModelMmio> {
        let regs = unsafe {
            RegisterBlock::new_with_mmio(
                DILITHIUM_MODEL_ADDR as usize as *mut u32,
                BusMmio::new(self.accel.clone()),
            )
        };
        let mut accel = Accelerator::new(regs);
        accel.set_spin_budget(TEST_SPIN_BUDGET);
        Dilithium::new(accel, ScratchBuffer::from_mem(&mut self.scratch))
    }
}

/// Packs reference key material into the wire public key.
pub fn wire_pk(km: &pqsm_emu::crypto::KeyMaterial) -> Vec<u8> {
    let mut pk = km.rho.clone();
    pk.extend_from_slice(&km.t1);
    pk
}

/// Packs reference key material into the wire secret key.
pub fn wire_sk(km: &pqsm_emu::crypto::KeyMaterial) -> Vec<u8> {
    let mut sk = km.rho.clone();
    sk.extend_from_slice(&km.k);
    sk.extend_from_slice(&km.tr);
    sk.extend_from_slice(&km.s1);
    sk.extend_from_slice(&km.s2);
    sk.extend_from_slice(&km.t0);
    sk
}

/// Packs reference signature parts into the wire signature `(C, Z, H)`.
pub fn wire_sig(z: &[u8], h: &[u8], c: &[u8]) -> Vec<u8> {
    let mut sig = c.to_vec();
    sig.extend_from_slice(z);
    sig.extend_from_slice(h);
    sig
}
