/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::fmt::Display;

use crate::Message;

/// Identifies a kind of middleware, used to skip it when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareType(pub &'static str);

/// A transformation applied to a message before it is written.
///
/// Middlewares run in the order they were registered with
/// [`Message::middleware`]. A middleware never fails: when it cannot do its
/// job it logs the reason and returns the message it was given.
pub trait Middleware: Send + Sync {
    fn handle<'x>(&self, message: Message<'x>) -> Message<'x>;

    fn middleware_type(&self) -> MiddlewareType;
}

impl Display for MiddlewareType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}
