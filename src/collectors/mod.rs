//! Collectors module for snapshot fragments.
//!
//! This module contains the readers for network throughput, filesystem usage,
//! physical disks, routing, and Proxmox guest inventory.

pub mod blockdev;
pub mod filesystem;
pub mod netdev;
pub mod proxmox;
pub mod route;
