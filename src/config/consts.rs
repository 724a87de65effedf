// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default capacity of every queue a runtime creates
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
/// Default worker count for `worker_pool`, and branch count for `fan_out_fan_in`
pub const DEFAULT_WORKERS: usize = 4;
/// Default time the consumer waits for the next output before giving up (5 seconds)
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5_000;
