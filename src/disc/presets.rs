use std::collections::BTreeMap;

use itertools::join;
use log::debug;

use super::{coefficients::CoefficientModel, error::ConfigError};
use crate::parameters::ParameterMap;

/// Named coefficient models, one per disc mold
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistry {
    models: BTreeMap<String, CoefficientModel>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    pub fn empty() -> Self {
        ModelRegistry {
            models: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let base = CoefficientModel::default();
        let mold = CoefficientModel::mold;

        let models = [
            ("default", base),
            ("hummel", base),
            // Stress-test model, wildly unphysical
            ("jankie", mold(999.0, 999.0, 999.0, -999.0, 999.0)),
            ("aviar", mold(0.152, 0.044, 0.083, -0.018, 0.002)),
            ("buzz", mold(0.099, 0.041, 0.061, -0.033, 0.004)),
            ("roc", mold(0.053, 0.043, 0.067, -0.015, 0.003)),
            ("flick", mold(0.100, 0.038, 0.076, -0.007, 0.008)),
            ("storm", mold(0.107, 0.045, 0.057, -0.026, 0.004)),
            ("wraith", mold(0.143, 0.040, 0.055, -0.020, 0.006)),
            ("quarter", mold(0.138, 0.039, 0.065, -0.038, 0.005)),
        ];

        ModelRegistry {
            models: models
                .into_iter()
                .map(|(name, model)| (name.to_string(), model))
                .collect(),
        }
    }

    /// Builtin molds plus the custom ones in the `models` map of a parameter tree
    pub fn from_params(params: &ParameterMap) -> Result<Self, ConfigError> {
        let mut registry = Self::builtin();
        if let Some(models) = params.get_map_opt("models")? {
            registry.load_params(models)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Result<&CoefficientModel, ConfigError> {
        self.models
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Adds or replaces a model. Models with non-finite coefficients are rejected.
    pub fn insert(&mut self, name: &str, model: CoefficientModel) -> Result<(), ConfigError> {
        model.validate()?;
        self.models.insert(name.to_string(), model);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CoefficientModel)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Loads custom models from a `models` parameter map. Each entry starts
    /// from the model named by its `base` key (the default model if absent).
    /// A base may be another custom model from the same map, which is then
    /// loaded first. A base naming its own entry refers to the model already
    /// registered under that name.
    pub fn load_params(&mut self, params: &ParameterMap) -> Result<(), ConfigError> {
        let mut pending = vec![];
        for (name, tree) in params.iter() {
            let model_params = tree.as_map()?;
            let base_name = model_params.get_string_or("base", "default")?;
            pending.push((name.as_str(), model_params, base_name));
        }

        while !pending.is_empty() {
            let ready = pending.iter().position(|(name, _, base_name)| {
                base_name == name || !pending.iter().any(|(other, _, _)| other == base_name)
            });
            let Some(i) = ready else {
                return Err(ConfigError::InvalidSetting {
                    name: "models".to_string(),
                    reason: format!(
                        "circular base models: {}",
                        join(pending.iter().map(|(name, _, _)| name), ", ")
                    ),
                });
            };

            let (name, model_params, base_name) = pending.remove(i);
            let base = *self.get(&base_name)?;
            let model = CoefficientModel::from_params(&base, model_params)?;

            debug!("Loaded disc model '{name}' (base '{base_name}')");
            self.insert(name, model)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::parse_string;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_names() {
        let registry = ModelRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![
                "aviar", "buzz", "default", "flick", "hummel", "jankie", "quarter", "roc",
                "storm", "wraith"
            ]
        );
        for (_, model) in registry.iter() {
            assert_eq!(model.validate(), Ok(()));
        }
    }

    #[test]
    fn test_mold_values() {
        let registry = ModelRegistry::builtin();
        let aviar = registry.get("aviar").unwrap();
        let base = registry.get("default").unwrap();

        assert_eq!(aviar.PL0, 0.152);
        assert_eq!(aviar.PTya, 0.002);
        assert_eq!(aviar.PDa, base.PDa);
        assert_eq!(aviar.PTzwz, base.PTzwz);
        assert_eq!(aviar.alpha_0, base.alpha_0);
        assert_eq!(registry.get("hummel"), registry.get("default"));
        assert_eq!(registry.get("jankie").unwrap().PTy0, -999.0);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::builtin();
        assert_eq!(
            registry.get("destroyer"),
            Err(ConfigError::UnknownModel("destroyer".to_string()))
        );
    }

    #[test]
    fn test_insert_rejects_non_finite() {
        let mut registry = ModelRegistry::empty();
        let bad = CoefficientModel {
            PL0: f64::NAN,
            ..Default::default()
        };
        assert!(registry.insert("bad", bad).is_err());
        assert!(registry.is_empty());

        registry.insert("zero", CoefficientModel::zero()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_params() {
        let params = parse_string(
            "
            [heavy]
            base = { val = \"aviar\", type = \"str\" }
            PD0 = { val = 0.3, type = \"float\" }

            [sinker]
            PL0 = { val = -0.5, type = \"float\" }
            PLa = { val = 0.0, type = \"float\" }
            "
            .to_string(),
        )
        .unwrap();

        let mut registry = ModelRegistry::builtin();
        registry.load_params(&params).unwrap();

        let heavy = registry.get("heavy").unwrap();
        assert_eq!(heavy.PD0, 0.3);
        assert_eq!(heavy.PL0, 0.152);

        let sinker = registry.get("sinker").unwrap();
        assert_eq!(sinker.PL0, -0.5);
        assert_eq!(sinker.PD0, 0.18);

        let params = parse_string(
            "[bad]
            base = { val = \"frisbee\", type = \"str\" }"
                .to_string(),
        )
        .unwrap();
        assert_eq!(
            registry.load_params(&params),
            Err(ConfigError::UnknownModel("frisbee".to_string()))
        );
    }

    #[test]
    fn test_load_params_base_order() {
        let params = parse_string(
            "
            [a_flippy]
            base = { val = \"z_stable\", type = \"str\" }
            PTy0 = { val = 0.01, type = \"float\" }

            [aviar]
            base = { val = \"aviar\", type = \"str\" }
            PL0 = { val = 0.2, type = \"float\" }

            [z_stable]
            base = { val = \"aviar\", type = \"str\" }
            PTy0 = { val = -0.05, type = \"float\" }
            PD0 = { val = 0.1, type = \"float\" }
            "
            .to_string(),
        )
        .unwrap();

        let mut registry = ModelRegistry::builtin();
        registry.load_params(&params).unwrap();

        let z_stable = registry.get("z_stable").unwrap();
        assert_eq!(z_stable.PTy0, -0.05);
        assert_eq!(z_stable.PD0, 0.1);

        let a_flippy = registry.get("a_flippy").unwrap();
        assert_eq!(a_flippy.PTy0, 0.01);
        assert_eq!(a_flippy.PD0, 0.1);

        // Custom molds based on "aviar" see the overridden aviar
        assert_eq!(registry.get("aviar").unwrap().PL0, 0.2);
        assert_eq!(z_stable.PL0, 0.2);
        assert_eq!(a_flippy.PL0, 0.2);
    }

    #[test]
    fn test_from_params() {
        let params = parse_string(
            "
            [sim]
            dt = { val = 0.02, type = \"float\" }

            [models.heavy]
            base = { val = \"aviar\", type = \"str\" }
            PD0 = { val = 0.3, type = \"float\" }
            "
            .to_string(),
        )
        .unwrap();

        let registry = ModelRegistry::from_params(&params).unwrap();
        assert_eq!(registry.len(), ModelRegistry::builtin().len() + 1);
        assert_eq!(registry.get("heavy").unwrap().PD0, 0.3);

        let registry = ModelRegistry::from_params(&ParameterMap::default()).unwrap();
        assert_eq!(registry, ModelRegistry::builtin());
    }

    #[test]
    fn test_load_params_circular_base() {
        let params = parse_string(
            "
            [one]
            base = { val = \"two\", type = \"str\" }

            [two]
            base = { val = \"one\", type = \"str\" }
            "
            .to_string(),
        )
        .unwrap();

        let mut registry = ModelRegistry::builtin();
        assert_eq!(
            registry.load_params(&params),
            Err(ConfigError::InvalidSetting {
                name: "models".to_string(),
                reason: "circular base models: one, two".to_string(),
            })
        );
        assert!(!registry.contains("one"));
    }
}
