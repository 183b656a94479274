use super::Network;

/// The four network roles of the training stack
///
/// The discriminants are the tags stored in the `nn_info.bin` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    DqnOnline = 0,
    DqnTarget = 1,
    RndPredictor = 2,
    RndTarget = 3,
}

impl Role {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Role> {
        match tag {
            0 => Some(Role::DqnOnline),
            1 => Some(Role::DqnTarget),
            2 => Some(Role::RndPredictor),
            3 => Some(Role::RndTarget),
            _ => None,
        }
    }

    /// Loss log file name, for the roles that keep one
    pub fn loss_log_name(self) -> Option<&'static str> {
        match self {
            Role::DqnOnline => Some("online_system.log"),
            Role::RndPredictor => Some("rnd_predictor_system.log"),
            Role::DqnTarget | Role::RndTarget => None,
        }
    }
}

/// A `(role, index)` reference into the [`NetworkRegistry`]
pub type NetworkHandle = (Role, usize);

/// Role-indexed storage for every live network
///
/// Four independent lists, one per role. Policies and the trainer address
/// networks through [`NetworkHandle`]s instead of holding references, so a
/// single owner can hand out mutable access one call at a time.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    slots: [Vec<Network>; 4],
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a network under its own role, returning its handle
    pub fn insert(&mut self, network: Network) -> NetworkHandle {
        let role = network.role();
        let slot = &mut self.slots[role as usize];
        slot.push(network);
        (role, slot.len() - 1)
    }

    pub fn get(&self, (role, id): NetworkHandle) -> Option<&Network> {
        self.slots[role as usize].get(id)
    }

    pub fn get_mut(&mut self, (role, id): NetworkHandle) -> Option<&mut Network> {
        self.slots[role as usize].get_mut(id)
    }

    /// Number of networks registered under a role
    pub fn count(&self, role: Role) -> usize {
        self.slots[role as usize].len()
    }

    /// Mutable access to two networks in distinct roles at once
    ///
    /// Needed when one network reads from another, e.g. the hard
    /// online-to-target copy.
    ///
    /// **Panics** if `a.0 == b.0`
    pub fn get_pair_mut(
        &mut self,
        a: NetworkHandle,
        b: NetworkHandle,
    ) -> (Option<&mut Network>, Option<&mut Network>) {
        assert_ne!(a.0, b.0, "pair access requires two distinct roles");
        let (lo, hi) = if (a.0 as usize) < (b.0 as usize) {
            (a, b)
        } else {
            (b, a)
        };
        let (head, tail) = self.slots.split_at_mut(hi.0 as usize);
        let lo_net = head[lo.0 as usize].get_mut(lo.1);
        let hi_net = tail[0].get_mut(hi.1);
        if (a.0 as usize) < (b.0 as usize) {
            (lo_net, hi_net)
        } else {
            (hi_net, lo_net)
        }
    }
}
