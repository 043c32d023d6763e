use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HelloSpec defines the desired state of Hello
#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, PartialEq, Eq)]
#[kube(
    group = "mygroup.example.com",
    version = "v1",
    kind = "Hello",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HelloSpec {
    /// Text echoed by every pod of the managed Deployment.
    pub msg: String,

    /// Number of replicas the managed Deployment should run.
    #[schemars(range(min = 0))]
    pub size: i32,
}

#[cfg(test)]
mod tests {
    use kube::CustomResourceExt;

    use super::*;

    #[test]
    fn crd_is_namespaced_under_mygroup() {
        let crd = Hello::crd();
        assert_eq!(crd.spec.group, "mygroup.example.com");
        assert_eq!(crd.spec.names.kind, "Hello");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.versions[0].name, "v1");
    }

    #[test]
    fn crd_schema_requires_msg_and_non_negative_size() {
        let crd = Hello::crd();
        let schema = serde_json::to_value(&crd.spec.versions[0].schema).unwrap();
        let spec = &schema["openAPIV3Schema"]["properties"]["spec"];

        let required = spec["required"].as_array().unwrap();
        assert!(required.contains(&"msg".into()));
        assert!(required.contains(&"size".into()));
        assert_eq!(spec["properties"]["size"]["minimum"].as_f64(), Some(0.0));
    }

    #[test]
    fn spec_deserializes_from_manifest() {
        let hello: Hello = serde_yaml::from_str(
            r#"
apiVersion: mygroup.example.com/v1
kind: Hello
metadata:
  name: demo
  namespace: default
spec:
  msg: hi
  size: 3
"#,
        )
        .unwrap();
        assert_eq!(
            hello.spec,
            HelloSpec {
                msg: "hi".into(),
                size: 3
            }
        );
    }
}
