// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The NDN face collaborator and an in-process simulated implementation of
//! it, used by tests and the demo CLI in place of a real transport.

pub mod face;
pub mod sim;

pub use face::{ChildSelector, Face, FaceError, FetchedData, Interest, InterestSelectors, InterestStream};
pub use sim::{SimFace, SimNetwork};
