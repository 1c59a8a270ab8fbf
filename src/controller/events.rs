use std::{fmt, sync::Arc};

use k8s_openapi::api::networking::v1::Ingress;
use kube::{api::ObjectMeta, ResourceExt};

/// A change of an ingress as observed by the controller.
#[derive(Clone, Debug)]
pub enum Event {
    /// `old` equals `new` for ingresses taken from the cache.
    Update { old: Arc<Ingress>, new: Arc<Ingress> },
    Delete { ingress: Arc<Ingress> },
}

impl Event {
    pub fn added(ingress: Arc<Ingress>) -> Self {
        Event::Update {
            old: Arc::clone(&ingress),
            new: ingress,
        }
    }

    /// Deletion of an ingress that is no longer cached. The stand-in only
    /// carries what is needed to delete its monitor.
    pub fn vanished(namespace: String, name: String) -> Self {
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                ..Default::default()
            },
            ..Default::default()
        };
        Event::Delete { ingress: Arc::new(ingress) }
    }

    /// The most recent state of the ingress carried by the event.
    pub fn ingress(&self) -> &Ingress {
        match self {
            Event::Update { new, .. } => new,
            Event::Delete { ingress } => ingress,
        }
    }

    pub fn key(&self) -> String {
        ingress_key(self.ingress())
    }
}

/// `namespace/name` of an ingress.
pub fn ingress_key(ingress: &Ingress) -> String {
    format!("{}/{}", ingress.namespace().unwrap_or_default(), ingress.name_any())
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Update { .. } => write!(f, "update {}", self.key()),
            Event::Delete { .. } => write!(f, "delete {}", self.key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::networking::v1::Ingress;

    use super::Event;

    fn ingress(name: &str) -> Arc<Ingress> {
        Arc::new(serde_yaml::from_str(&format!("metadata: {{name: {name}, namespace: kube-system}}")).unwrap())
    }

    #[test]
    fn events_are_keyed_by_namespace_and_name() {
        let update = Event::Update {
            old: ingress("old"),
            new: ingress("foo"),
        };
        assert_eq!(update.key(), "kube-system/foo");
        assert_eq!(update.to_string(), "update kube-system/foo");

        let delete = Event::Delete { ingress: ingress("foo") };
        assert_eq!(delete.key(), "kube-system/foo");
        assert_eq!(delete.to_string(), "delete kube-system/foo");
    }

    #[test]
    fn vanished_ingresses_only_carry_their_name() {
        let event = Event::vanished("kube-system".to_owned(), "foo".to_owned());

        assert_eq!(event.to_string(), "delete kube-system/foo");
        assert!(event.ingress().spec.is_none());
        assert!(event.ingress().metadata.annotations.is_none());
    }
}
