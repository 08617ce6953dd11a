use parley_core::{PeerId, Role, RolePreference};

/// How a remote peer first showed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceCue {
    /// Its `Join` arrived: it is the newcomer.
    RemoteJoined,
    /// It answered our `Join` with `Present`: we are the newcomer.
    RemotePresent,
    /// Its first message was negotiation traffic (offer or candidate).
    RemoteNegotiating,
}

/// One pairwise negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub initiator: PeerId,
    pub responder: PeerId,
}

/// A participant joining a room initiates toward every peer already in it.
pub fn pair_roles(existing: &[PeerId], joining: &PeerId) -> Vec<Pairing> {
    existing
        .iter()
        .filter(|peer| *peer != joining)
        .map(|peer| Pairing {
            initiator: joining.clone(),
            responder: peer.clone(),
        })
        .collect()
}

fn role_in(pairings: &[Pairing], who: &PeerId) -> Option<Role> {
    pairings.iter().find_map(|p| {
        if &p.initiator == who {
            Some(Role::Initiator)
        } else if &p.responder == who {
            Some(Role::Responder)
        } else {
            None
        }
    })
}

/// Role the local participant takes toward `remote`.
pub fn local_role(preference: RolePreference, cue: PresenceCue, local: &PeerId, remote: &PeerId) -> Role {
    if cue == PresenceCue::RemoteNegotiating {
        return Role::Responder;
    }
    match preference {
        RolePreference::Initiator => Role::Initiator,
        RolePreference::Responder => Role::Responder,
        RolePreference::Auto => {
            let pairings = match cue {
                PresenceCue::RemoteJoined => pair_roles(std::slice::from_ref(local), remote),
                _ => pair_roles(std::slice::from_ref(remote), local),
            };
            role_in(&pairings, local).unwrap_or(Role::Responder)
        }
    }
}

/// Both sides saw each other's `Join` and both became responder. The side
/// with the smaller identity takes over as initiator.
pub fn glare_role(local: &PeerId, remote: &PeerId) -> Role {
    if local < remote {
        Role::Initiator
    } else {
        Role::Responder
    }
}
