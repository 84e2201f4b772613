//! Override controller.
//!
//! Applies and removes per-port VLAN and QoS overrides through the hardware
//! seam. A VLAN override is a PVID change plus a membership move: the port
//! leaves its previously overridden VLAN before joining the new one, so
//! membership never accumulates across re-authentications.

use crate::config::{GlobalConfig, PortConfig, PortRuntime, VlanOrigin};
use nas_types::{PortKey, PriorityClass, VlanId};
use std::sync::Arc;
use tracing::{debug, info};

/// Seam to the VLAN and QoS modules.
pub trait OverrideCallbacks: Send + Sync {
    /// Overrides the port's untagged VLAN.
    fn set_pvid(&self, port: PortKey, vid: VlanId);

    /// Removes the PVID override, restoring the configured value.
    fn clear_pvid(&self, port: PortKey);

    /// Adds the port to a VLAN's member set.
    fn join_vlan(&self, port: PortKey, vid: VlanId);

    /// Removes the port from a VLAN's member set.
    fn leave_vlan(&self, port: PortKey, vid: VlanId);

    /// Overrides the port's default traffic class.
    fn set_qos_class(&self, port: PortKey, class: PriorityClass);

    /// Removes the traffic class override.
    fn clear_qos_class(&self, port: PortKey);
}

/// Owns the override state transitions for every port.
pub struct OverrideController {
    callbacks: Arc<dyn OverrideCallbacks>,
}

impl OverrideController {
    pub fn new(callbacks: Arc<dyn OverrideCallbacks>) -> Self {
        OverrideController { callbacks }
    }

    /// Applies a VLAN override to a port.
    pub fn apply_vlan(&self, port: PortKey, rt: &mut PortRuntime, vid: VlanId, origin: VlanOrigin) {
        if rt.overridden_vlan == Some(vid) && rt.vlan_origin == origin {
            return;
        }
        if let Some(old) = rt.overridden_vlan {
            if old != vid {
                self.callbacks.leave_vlan(port, old);
            }
        }
        info!(%port, %vid, ?origin, "applying VLAN override");
        self.callbacks.set_pvid(port, vid);
        if rt.overridden_vlan != Some(vid) {
            self.callbacks.join_vlan(port, vid);
        }
        rt.overridden_vlan = Some(vid);
        rt.vlan_origin = origin;
    }

    /// Removes any VLAN override from a port.
    pub fn clear_vlan(&self, port: PortKey, rt: &mut PortRuntime) {
        let Some(old) = rt.overridden_vlan.take() else { return };
        info!(%port, %old, "clearing VLAN override");
        self.callbacks.leave_vlan(port, old);
        self.callbacks.clear_pvid(port);
        rt.vlan_origin = VlanOrigin::None;
    }

    /// Applies a QoS class override to a port.
    pub fn apply_qos(&self, port: PortKey, rt: &mut PortRuntime, class: PriorityClass) {
        if rt.overridden_qos == Some(class) {
            return;
        }
        debug!(%port, %class, "applying QoS override");
        self.callbacks.set_qos_class(port, class);
        rt.overridden_qos = Some(class);
    }

    /// Removes any QoS override from a port.
    pub fn clear_qos(&self, port: PortKey, rt: &mut PortRuntime) {
        if rt.overridden_qos.take().is_some() {
            debug!(%port, "clearing QoS override");
            self.callbacks.clear_qos_class(port);
        }
    }

    /// Whether a port may fall back to the Guest VLAN right now.
    ///
    /// Entry requires fallback to be enabled both globally and on the port
    /// and, unless credential frames are explicitly allowed, that none was
    /// seen since link-up.
    pub fn guest_entry_allowed(
        &self,
        global: &GlobalConfig,
        port_cfg: &PortConfig,
        rt: &PortRuntime,
    ) -> bool {
        global.guest_vlan_enabled
            && port_cfg.guest_vlan_enabled
            && (global.guest_vlan_allow_eapol || !rt.frame_seen)
    }

    /// Moves a port onto the Guest VLAN.
    pub fn enter_guest(&self, port: PortKey, rt: &mut PortRuntime, guest_vlan: VlanId) {
        info!(%port, %guest_vlan, "entering Guest VLAN");
        self.apply_vlan(port, rt, guest_vlan, VlanOrigin::Guest);
    }

    /// Takes a port off the Guest VLAN, if it is on it.
    ///
    /// Returns true when the port was on the Guest VLAN.
    pub fn exit_guest(&self, port: PortKey, rt: &mut PortRuntime) -> bool {
        if rt.vlan_origin != VlanOrigin::Guest {
            return false;
        }
        info!(%port, "leaving Guest VLAN");
        self.clear_vlan(port, rt);
        true
    }

    /// Removes every override from a port. Used on link-down, mode change,
    /// and unit departure.
    pub fn clear_all(&self, port: PortKey, rt: &mut PortRuntime) {
        self.clear_vlan(port, rt);
        self.clear_qos(port, rt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nas_types::{PortNo, UnitId};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        SetPvid(PortKey, u16),
        ClearPvid(PortKey),
        Join(PortKey, u16),
        Leave(PortKey, u16),
        SetQos(PortKey, u8),
        ClearQos(PortKey),
    }

    #[derive(Default)]
    struct TestCallbacks {
        calls: Mutex<Vec<Call>>,
    }

    impl TestCallbacks {
        fn take(&self) -> Vec<Call> {
            std::mem::take(&mut self.calls.lock().unwrap())
        }
    }

    impl OverrideCallbacks for TestCallbacks {
        fn set_pvid(&self, port: PortKey, vid: VlanId) {
            self.calls.lock().unwrap().push(Call::SetPvid(port, vid.as_u16()));
        }
        fn clear_pvid(&self, port: PortKey) {
            self.calls.lock().unwrap().push(Call::ClearPvid(port));
        }
        fn join_vlan(&self, port: PortKey, vid: VlanId) {
            self.calls.lock().unwrap().push(Call::Join(port, vid.as_u16()));
        }
        fn leave_vlan(&self, port: PortKey, vid: VlanId) {
            self.calls.lock().unwrap().push(Call::Leave(port, vid.as_u16()));
        }
        fn set_qos_class(&self, port: PortKey, class: PriorityClass) {
            self.calls.lock().unwrap().push(Call::SetQos(port, class.as_u8()));
        }
        fn clear_qos_class(&self, port: PortKey) {
            self.calls.lock().unwrap().push(Call::ClearQos(port));
        }
    }

    fn setup() -> (Arc<TestCallbacks>, OverrideController, PortKey, PortRuntime) {
        let cb = Arc::new(TestCallbacks::default());
        let ctl = OverrideController::new(cb.clone());
        let port = PortKey::new(UnitId::new(1).unwrap(), PortNo(3));
        (cb, ctl, port, PortRuntime::default())
    }

    fn vid(v: u16) -> VlanId {
        VlanId::new(v).unwrap()
    }

    #[test]
    fn test_apply_then_clear_vlan() {
        let (cb, ctl, port, mut rt) = setup();
        ctl.apply_vlan(port, &mut rt, vid(20), VlanOrigin::Backend);
        assert_eq!(cb.take(), vec![Call::SetPvid(port, 20), Call::Join(port, 20)]);
        assert_eq!(rt.overridden_vlan, Some(vid(20)));
        assert_eq!(rt.vlan_origin, VlanOrigin::Backend);

        ctl.clear_vlan(port, &mut rt);
        assert_eq!(cb.take(), vec![Call::Leave(port, 20), Call::ClearPvid(port)]);
        assert_eq!(rt.overridden_vlan, None);
        assert_eq!(rt.vlan_origin, VlanOrigin::None);
    }

    #[test]
    fn test_vlan_move_leaves_old_first() {
        let (cb, ctl, port, mut rt) = setup();
        ctl.apply_vlan(port, &mut rt, vid(20), VlanOrigin::Backend);
        cb.take();
        ctl.apply_vlan(port, &mut rt, vid(30), VlanOrigin::Backend);
        assert_eq!(
            cb.take(),
            vec![Call::Leave(port, 20), Call::SetPvid(port, 30), Call::Join(port, 30)]
        );
    }

    #[test]
    fn test_apply_same_vlan_is_noop() {
        let (cb, ctl, port, mut rt) = setup();
        ctl.apply_vlan(port, &mut rt, vid(20), VlanOrigin::Backend);
        cb.take();
        ctl.apply_vlan(port, &mut rt, vid(20), VlanOrigin::Backend);
        assert_eq!(cb.take(), vec![]);
    }

    #[test]
    fn test_clear_without_override_is_noop() {
        let (cb, ctl, port, mut rt) = setup();
        ctl.clear_vlan(port, &mut rt);
        ctl.clear_qos(port, &mut rt);
        assert_eq!(cb.take(), vec![]);
    }

    #[test]
    fn test_qos_round_trip() {
        let (cb, ctl, port, mut rt) = setup();
        let class = PriorityClass::new(5).unwrap();
        ctl.apply_qos(port, &mut rt, class);
        ctl.apply_qos(port, &mut rt, class);
        ctl.clear_qos(port, &mut rt);
        assert_eq!(cb.take(), vec![Call::SetQos(port, 5), Call::ClearQos(port)]);
    }

    #[test]
    fn test_guest_entry_gate() {
        let (_cb, ctl, _port, mut rt) = setup();
        let mut global = GlobalConfig::default();
        let mut port_cfg = PortConfig::default();

        assert!(!ctl.guest_entry_allowed(&global, &port_cfg, &rt));

        port_cfg.guest_vlan_enabled = true;
        // Still gated on the master enable.
        assert!(!ctl.guest_entry_allowed(&global, &port_cfg, &rt));

        global.guest_vlan_enabled = true;
        assert!(ctl.guest_entry_allowed(&global, &port_cfg, &rt));

        rt.frame_seen = true;
        assert!(!ctl.guest_entry_allowed(&global, &port_cfg, &rt));

        global.guest_vlan_allow_eapol = true;
        assert!(ctl.guest_entry_allowed(&global, &port_cfg, &rt));
    }

    #[test]
    fn test_guest_enter_exit() {
        let (cb, ctl, port, mut rt) = setup();
        ctl.enter_guest(port, &mut rt, vid(99));
        assert_eq!(rt.vlan_origin, VlanOrigin::Guest);
        cb.take();

        assert!(ctl.exit_guest(port, &mut rt));
        assert_eq!(cb.take(), vec![Call::Leave(port, 99), Call::ClearPvid(port)]);
        // Not on the Guest VLAN any more.
        assert!(!ctl.exit_guest(port, &mut rt));
    }

    #[test]
    fn test_exit_guest_ignores_backend_override() {
        let (_cb, ctl, port, mut rt) = setup();
        ctl.apply_vlan(port, &mut rt, vid(20), VlanOrigin::Backend);
        assert!(!ctl.exit_guest(port, &mut rt));
        assert_eq!(rt.overridden_vlan, Some(vid(20)));
    }
}
