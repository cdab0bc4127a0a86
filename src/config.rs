/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Tunables for a [`crate::SessionManager`] instance, supplied once at
/// construction by the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionManagerConfig {
    /// Ceiling on the number of inside-ingress messages buffered while
    /// waiting for a session to come up (§4.5). Oldest-by-prune, not
    /// oldest-by-insertion: a sweep runs before a new entry is rejected.
    pub max_buffered_messages: usize,

    /// Half-life, in milliseconds, used by the embedder's path-metric
    /// smoothing. The manager stores this on behalf of callers that read it
    /// back out of the config but does not itself interpret it: metric
    /// computation is out of scope (see Non-goals).
    pub metric_halflife_ms: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_buffered_messages: 256,
            metric_halflife_ms: 60_000,
        }
    }
}
