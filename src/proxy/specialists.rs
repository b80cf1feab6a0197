//! Specialist persona lookup for `/specialist-chat`.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::SpecialistConfig;
use crate::orchestrator::RequestOptions;

/// A persona that overrides the system prompt and temperature.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Specialist {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Specialist {
    /// Write this persona's overrides into `options`.
    pub fn apply(&self, options: &mut RequestOptions) {
        options.system_prompt = Some(self.system_prompt.clone());
        if self.temperature.is_some() {
            options.temperature = self.temperature;
        }
    }
}

/// Specialists by id, in declaration order for listings.
#[derive(Debug, Clone, Default)]
pub struct SpecialistRegistry {
    specialists: Vec<Specialist>,
    index: HashMap<String, usize>,
}

impl SpecialistRegistry {
    pub fn from_config(configs: &[SpecialistConfig]) -> Self {
        let specialists: Vec<Specialist> = configs
            .iter()
            .map(|c| Specialist {
                id: c.id.clone(),
                name: c.name.clone(),
                system_prompt: c.system_prompt.clone(),
                temperature: c.temperature,
            })
            .collect();
        let index = specialists
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self { specialists, index }
    }

    pub fn get(&self, id: &str) -> Option<&Specialist> {
        self.index.get(id).map(|&i| &self.specialists[i])
    }

    pub fn all(&self) -> &[Specialist] {
        &self.specialists
    }
}
