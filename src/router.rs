/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::net::Ipv6Addr;

use crate::config::SessionManagerConfig;
use crate::crypto::{CryptoAuth, PublicKey};
use crate::error::Logger;
use crate::events::{InboundEvent, OutboundEvent};
use crate::manager::{EventOutcome, IngressOutcome, SessionManager};
use crate::util::packet::Packet;

/// Sends a fully-framed packet out the switch (ciphertext) interface.
pub trait SwitchTx {
    fn send_switch(&mut self, packet: Packet);
}

/// Sends a route-header-prefixed packet out the inside (plaintext) interface.
pub trait InsideTx {
    fn send_inside(&mut self, packet: Packet);
}

/// Emits an outbound event on the Pathfinder bus.
pub trait EventSink {
    fn emit(&mut self, event: OutboundEvent);
}

/// Wires a [`SessionManager`] to its transport collaborators. This is the
/// "Wiring / construction" component: it owns the manager and the interfaces
/// around it, translating `IngressOutcome`/`EventOutcome` into calls on the
/// appropriate collaborator, the way the reference codebase's top-level
/// hypervisor facade glues a node to one `Interface` implementation.
pub struct Router<CA: CryptoAuth, SW: SwitchTx, IN: InsideTx, EV: EventSink, LG: Logger> {
    manager: SessionManager<CA>,
    switch_tx: SW,
    inside_tx: IN,
    events: EV,
    logger: LG,
}

impl<CA, SW, IN, EV, LG> Router<CA, SW, IN, EV, LG>
where
    CA: CryptoAuth,
    SW: SwitchTx,
    IN: InsideTx,
    EV: EventSink,
    LG: Logger,
{
    pub fn new(
        ca: CA,
        local_public_key: PublicKey,
        config: SessionManagerConfig,
        switch_tx: SW,
        inside_tx: IN,
        events: EV,
        logger: LG,
    ) -> Self {
        Self {
            manager: SessionManager::new(ca, local_public_key, config),
            switch_tx,
            inside_tx,
            events,
            logger,
        }
    }

    pub fn manager(&self) -> &SessionManager<CA> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SessionManager<CA> {
        &mut self.manager
    }

    /// Feed a packet that arrived on the switch interface through ingress,
    /// forwarding the result to the inside interface if applicable.
    pub fn on_switch_packet(&mut self, packet: Packet, now_ms: i64) {
        match self
            .manager
            .switch_ingress(packet, now_ms, &mut self.events, &mut self.logger)
        {
            IngressOutcome::Forwarded(packet) => self.inside_tx.send_inside(packet),
            IngressOutcome::SearchRequested => {}
            IngressOutcome::Dropped(reason) => {
                self.logger.debug(&format!("switch ingress dropped: {}", reason))
            }
        }
    }

    /// Feed a packet that arrived on the inside interface through ingress,
    /// forwarding the result to the switch interface if applicable.
    pub fn on_inside_packet(&mut self, packet: Packet, now_ms: i64) {
        match self
            .manager
            .inside_ingress(packet, now_ms, &mut self.events, &mut self.logger)
        {
            IngressOutcome::Forwarded(packet) => self.switch_tx.send_switch(packet),
            IngressOutcome::SearchRequested => {}
            IngressOutcome::Dropped(reason) => {
                self.logger.debug(&format!("inside ingress dropped: {}", reason))
            }
        }
    }

    /// Feed an event read off the Pathfinder bus to the manager, forwarding
    /// any drained packet to the switch interface.
    pub fn on_event(&mut self, event: InboundEvent, now_ms: i64) {
        match self
            .manager
            .handle_event(event, now_ms, &mut self.events, &mut self.logger)
        {
            EventOutcome::Drained(packet) => self.switch_tx.send_switch(packet),
            EventOutcome::Handled | EventOutcome::Ignored => {}
        }
    }

    /// Drive the manager's periodic housekeeping (buffer pruning, handshake
    /// timeout checks). The embedder calls this from its own timer facility.
    pub fn on_tick(&mut self, now_ms: i64) {
        self.manager.on_tick(now_ms);
    }

    /// Tear down a session, emitting `SESSION_ENDED`.
    pub fn end_session(&mut self, ip6: &Ipv6Addr) {
        self.manager.end_session(ip6, &mut self.events);
    }
}
