// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! Notegraph: an interactive canvas for a dependency graph of notes

use xilem::{EventLoop, winit::error::EventLoopError};

fn main() -> Result<(), EventLoopError> {
    notegraph::run(EventLoop::with_user_event())
}
