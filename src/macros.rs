// Copyright 2026 the quell developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Log at info level and bail from a `-> ()` context.
///
/// Idempotent operations use this to skip work that has already happened.
macro_rules! log_skip {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
        return;
    }};
}
