use crate::{Layer, LayerId};
use stencil_core::Color;

/// A design project: one template association, a base color applied under
/// the template mask, and the ordered layer sequence.
///
/// Layers are stored most-recent-first: `add_layer` inserts at the head,
/// and the compositor renders the sequence in reverse so the newest layer
/// ends up frontmost. The sequence order is the single source of z-order.
#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub name: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Fill applied under the template mask, beneath every layer.
    pub base_color: Color,
    pub template_id: String,
    pub layers: Vec<Layer>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        template_id: impl Into<String>,
        base_color: Color,
    ) -> Self {
        Self {
            name: name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            base_color,
            template_id: template_id.into(),
            layers: Vec::new(),
        }
    }

    /// Insert a layer at the head of the sequence and return its id.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        debug_assert!(
            !self.contains(layer.id),
            "layer ids must be unique within a project"
        );
        let id = layer.id;
        self.layers.insert(0, layer);
        id
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(index))
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    /// Move a layer to a new index in the sequence (0 = most recent,
    /// frontmost). Returns false if the layer does not exist.
    pub fn move_layer(&mut self, id: LayerId, index: usize) -> bool {
        let Some(from) = self.layers.iter().position(|l| l.id == id) else {
            return false;
        };
        let layer = self.layers.remove(from);
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CircleLayer, LayerData, RectLayer};

    fn rect(name: &str) -> Layer {
        Layer::new(
            name,
            LayerData::Rect(RectLayer {
                width: 10.0,
                height: 10.0,
                corner_radius: 0.0,
                fill: Color::BLACK,
                stroke: None,
            }),
        )
    }

    #[test]
    fn add_layer_inserts_at_head() {
        let mut project = Project::new("Mug", "mug-classic", Color::WHITE);
        let first = project.add_layer(rect("a"));
        let second = project.add_layer(rect("b"));

        assert_eq!(project.layers.len(), 2);
        // Most recent first.
        assert_eq!(project.layers[0].id, second);
        assert_eq!(project.layers[1].id, first);
    }

    #[test]
    fn remove_layer_returns_the_layer() {
        let mut project = Project::new("Mug", "mug-classic", Color::WHITE);
        let id = project.add_layer(rect("a"));
        let removed = project.remove_layer(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(project.layers.is_empty());
        assert!(project.remove_layer(id).is_none());
    }

    #[test]
    fn move_layer_reorders_the_sequence() {
        let mut project = Project::new("Mug", "mug-classic", Color::WHITE);
        let a = project.add_layer(rect("a"));
        let b = project.add_layer(rect("b"));
        let c = project.add_layer(rect("c"));
        // Sequence is now [c, b, a].
        assert!(project.move_layer(c, 2));
        let order: Vec<_> = project.layers.iter().map(|l| l.id).collect();
        assert_eq!(order, vec![b, a, c]);

        let circle = Layer::new(
            "ghost",
            LayerData::Circle(CircleLayer {
                radius: 1.0,
                fill: Color::BLACK,
                stroke: None,
            }),
        );
        assert!(!project.move_layer(circle.id, 0));
    }

    #[test]
    fn layer_ids_are_unique() {
        let mut project = Project::new("Mug", "mug-classic", Color::WHITE);
        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            let id = project.add_layer(rect(&format!("layer {i}")));
            assert!(seen.insert(id));
        }
    }
}
