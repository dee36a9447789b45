// Copyright 2025 The Axvisor Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! AxVTrap - Trap-and-emulate core of a single-guest virtual machine monitor.
//!
//! When the guest traps, the microkernel delivers a fault message to the monitor.
//! This crate classifies the message, routes it to the emulation logic that owns it
//! and decides whether and how the guest is resumed. Everything below the fault
//! message (address space, guest thread, reply endpoint, interrupt controller) is
//! reached through the [`AxVMHal`] trait.
//!
//! # Features
//!
//! - Fault dispatch over memory faults, hypercalls, illegal instructions, VGIC
//!   maintenance and virtual CPU traps
//! - Bounded device table with address-based routing of memory faults
//! - Optional on-demand mapping of unknown device pages (`ondemand-device-install`)
//! - Guest-physical to host-physical translation of contiguous ranges
//! - Ordered, fail-fast reboot hooks

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate alloc;
#[macro_use]
extern crate log;

// Core modules
mod addr; // Guest/host physical addresses and page granularity
mod config; // Per-VM configuration
mod device; // Devices and the device table
mod error; // Error taxonomy
mod exit; // Fault message taxonomy and decoding
mod fault; // The fault context of an episode
mod hal; // Interfaces to the surrounding monitor
mod hypercall; // Hypercall decoding
mod page_fault; // Memory fault routing and on-demand installation
mod reboot; // Reboot hooks
mod regs; // Opaque register snapshot
mod translate; // IPA to PA translation
mod vcpu_trap; // Virtual CPU trap classification
mod vm; // The VM and the fault dispatcher

// Public API exports
pub use addr::{GuestMapping, GuestPhysAddr, HostPhysAddr, PageSize};
pub use config::*;
pub use device::{AxVmDevice, DeviceFaultHandler, DeviceId};
pub use error::{DispatchError, HookError, RegistryError};
pub use exit::{label, FaultMessage};
pub use fault::{AccessWidth, FaultContext, FaultKind, FaultState};
pub use hal::{AxVMHal, MappingFlags};
pub use hypercall::Hypercall;
pub use reboot::RebootHookFn;
pub use regs::{GuestRegs, INSTRUCTION_WIDTH};
pub use vcpu_trap::{classify as classify_vcpu_trap, VcpuTrapOutcome};
pub use vm::AxVM;
