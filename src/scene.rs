//! Host scene model: objects, their material slots, and the materials' node graphs.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    #[default]
    Mesh,
    Camera,
    Light,
    Empty,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    /// Material slots, in slot order. A material may fill several slots.
    pub materials: Vec<MaterialId>,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub graph: Graph,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub objects: Vec<Object>,
    pub materials: Vec<Material>,
    pub active: Option<ObjectId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, id: ObjectId) -> Result<&Object> {
        self.objects
            .get(id.0)
            .ok_or_else(|| anyhow!("object not found: {id:?}"))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("object not found: {id:?}"))
    }

    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects.iter().position(|o| o.name == name).map(ObjectId)
    }

    pub fn material(&self, id: MaterialId) -> Result<&Material> {
        self.materials
            .get(id.0)
            .ok_or_else(|| anyhow!("material not found: {id:?}"))
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Result<&mut Material> {
        self.materials
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("material not found: {id:?}"))
    }

    pub fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.materials.iter().position(|m| m.name == name).map(MaterialId)
    }

    pub fn add_object(&mut self, name: impl Into<String>, kind: ObjectKind) -> ObjectId {
        self.objects.push(Object {
            name: name.into(),
            kind,
            materials: Vec::new(),
            selected: false,
        });
        ObjectId(self.objects.len() - 1)
    }

    pub fn add_material(&mut self, name: impl Into<String>, graph: Graph) -> MaterialId {
        self.materials.push(Material {
            name: name.into(),
            graph,
        });
        MaterialId(self.materials.len() - 1)
    }

    /// Append `material` to the object's slots.
    pub fn assign_material(&mut self, object: ObjectId, material: MaterialId) -> Result<()> {
        self.material(material)?;
        self.object_mut(object)?.materials.push(material);
        Ok(())
    }

    /// Distinct materials of an object, in slot order.
    pub fn object_materials(&self, object: ObjectId) -> Result<Vec<MaterialId>> {
        let mut out: Vec<MaterialId> = Vec::new();
        for &m in &self.object(object)?.materials {
            if !out.contains(&m) {
                out.push(m);
            }
        }
        Ok(out)
    }

    pub fn selected_objects(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.selected)
            .map(|(i, _)| ObjectId(i))
            .collect()
    }

    /// Selected objects that can be baked. Non-mesh selections are ignored.
    pub fn selected_meshes(&self) -> Vec<ObjectId> {
        self.selected_objects()
            .into_iter()
            .filter(|id| self.objects[id.0].kind == ObjectKind::Mesh)
            .collect()
    }

    /// Unique disambiguated name for a new material, `name`, `name.001`, ...
    pub fn unique_material_name(&self, name: &str) -> String {
        if self.material_by_name(name).is_none() {
            return name.to_string();
        }
        (1..)
            .map(|i| format!("{name}.{i:03}"))
            .find(|candidate| self.material_by_name(candidate).is_none())
            .unwrap_or_else(|| name.to_string())
    }
}
