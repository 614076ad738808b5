use crate::types::{Tool, ToolDescriptor};

use schemars::JsonSchema;
use schemars::schema::{Schema, SchemaObject};
use schemars::schema_for;
use serde::de::DeserializeOwned;
use serde_json::Error as JsonError;
use serde_json::Value;
use thiserror::Error;

type ToolTraitObject = Box<dyn Tool + Send + Sync>;
type Deserializer = Box<dyn Fn(Value) -> Result<ToolTraitObject, JsonError> + Send + Sync>;

pub struct ToolObject {
    pub json_schema: Value,
    pub description: String,
    pub name: String,
    deserializer: Deserializer,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("tool schema is missing a title or description")]
    MissingMetadata,
    #[error("could not convert to json")]
    JsonSerialization(JsonError),
}

impl ToolObject {
    pub fn try_from_tool<T>() -> Result<Self, ValidationError>
    where
        T: JsonSchema + Tool + DeserializeOwned + Send + Sync + 'static,
    {
        let schema = schema_for!(T);

        let (name, description) = validate_tool_schema(&schema.schema)?;

        let json_schema =
            serde_json::to_value(schema).map_err(ValidationError::JsonSerialization)?;

        let deserializer = Box::new(|arguments: Value| {
            serde_json::from_value::<T>(arguments).map(|tool| Box::new(tool) as ToolTraitObject)
        });

        Ok(Self {
            name,
            json_schema,
            description,
            deserializer,
        })
    }

    pub fn try_deserialize(&self, arguments: Value) -> Result<ToolTraitObject, JsonError> {
        (self.deserializer)(arguments)
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.json_schema.clone(),
        }
    }
}

fn validate_tool_schema(schema: &SchemaObject) -> Result<(String, String), ValidationError> {
    let name = schema
        .metadata
        .as_deref()
        .ok_or(ValidationError::MissingMetadata)?
        .title
        .as_deref()
        .ok_or(ValidationError::MissingMetadata)?
        .to_string();

    let description = validate_tool_description(schema)?;
    Ok((name, description))
}

// every argument needs a description too, the model picks values from them
fn validate_tool_description(schema: &SchemaObject) -> Result<String, ValidationError> {
    let description = schema
        .metadata
        .as_deref()
        .ok_or(ValidationError::MissingMetadata)?
        .description
        .as_deref()
        .ok_or(ValidationError::MissingMetadata)?;

    if let Some(object) = schema.object.as_deref() {
        for sub_schema in object.properties.values() {
            if let Schema::Object(sub_schema_object) = sub_schema {
                validate_tool_description(sub_schema_object)?;
            }
        }
    }

    Ok(description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[serde(rename = "shout")]
    #[schemars(description = "repeat a word in capitals")]
    struct Shout {
        #[schemars(description = "the word to shout")]
        word: String,
    }

    impl Tool for Shout {
        fn apply(&self) -> anyhow::Result<String> {
            Ok(self.word.to_uppercase())
        }
    }

    #[derive(Deserialize, JsonSchema)]
    #[schemars(description = "has an undocumented argument")]
    struct Undocumented {
        #[allow(dead_code)]
        value: u32,
    }

    impl Tool for Undocumented {
        fn apply(&self) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn derives_name_description_and_schema() {
        let object = ToolObject::try_from_tool::<Shout>().unwrap();
        assert_eq!(object.name, "shout");
        assert_eq!(object.description, "repeat a word in capitals");
        assert_eq!(object.json_schema["properties"]["word"]["type"], "string");
    }

    #[test]
    fn rejects_arguments_without_description() {
        let result = ToolObject::try_from_tool::<Undocumented>();
        assert!(matches!(result, Err(ValidationError::MissingMetadata)));
    }

    #[test]
    fn deserializes_and_applies() {
        let object = ToolObject::try_from_tool::<Shout>().unwrap();
        let tool = object
            .try_deserialize(serde_json::json!({"word": "hey"}))
            .unwrap();
        assert_eq!(tool.apply().unwrap(), "HEY");
    }
}
