use std::path::{Path, PathBuf};

/// Writes a two-joint skinned arm as `arm.gltf` + `arm.bin` into `dir`.
///
/// Node 0 holds the mesh and the skin, node 1 is the root joint at the origin
/// and node 2 the tip joint one unit above it. One triangle: vertex 0 follows
/// the root, vertices 1 and 2 follow the tip. The single clip "wave" moves
/// the tip from (0, 1, 0) to (2, 1, 0) over one second.
pub fn write_skinned_arm(dir: &Path) -> PathBuf {
    fn push_f32(bin: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            bin.extend_from_slice(&v.to_le_bytes());
        }
    }
    let mut bin: Vec<u8> = Vec::new();

    // positions: 0..36
    push_f32(
        &mut bin,
        &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    );
    // joints (u8 x4): 36..48
    bin.extend_from_slice(&[0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
    // weights: 48..96
    push_f32(
        &mut bin,
        &[
            1.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0,
        ],
    );
    // indices (u16): 96..102, padded to 104
    for i in [0u16, 1, 2] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    // inverse bind matrices: 104..232
    push_f32(
        &mut bin,
        &[
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0,
        ],
    );
    // keyframe times: 232..240
    push_f32(&mut bin, &[0.0, 1.0]);
    // keyframe translations: 240..264
    push_f32(&mut bin, &[0.0, 1.0, 0.0, 2.0, 1.0, 0.0]);
    assert_eq!(bin.len(), 264);

    let gltf = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0, 1] } ],
  "nodes": [
    { "name": "arm", "mesh": 0, "skin": 0 },
    { "name": "shoulder", "children": [2] },
    { "name": "hand", "translation": [0.0, 1.0, 0.0] }
  ],
  "meshes": [ {
    "primitives": [ {
      "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 },
      "indices": 3
    } ]
  } ],
  "skins": [ { "joints": [1, 2], "inverseBindMatrices": 4 } ],
  "animations": [ {
    "name": "wave",
    "samplers": [ { "input": 5, "output": 6, "interpolation": "LINEAR" } ],
    "channels": [ { "sampler": 0, "target": { "node": 2, "path": "translation" } } ]
  } ],
  "buffers": [ { "uri": "arm.bin", "byteLength": 264 } ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 12, "target": 34962 },
    { "buffer": 0, "byteOffset": 48, "byteLength": 48, "target": 34962 },
    { "buffer": 0, "byteOffset": 96, "byteLength": 6, "target": 34963 },
    { "buffer": 0, "byteOffset": 104, "byteLength": 128 },
    { "buffer": 0, "byteOffset": 232, "byteLength": 8 },
    { "buffer": 0, "byteOffset": 240, "byteLength": 24 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" },
    { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
    { "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" },
    { "bufferView": 4, "componentType": 5126, "count": 2, "type": "MAT4" },
    { "bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR",
      "min": [0.0], "max": [1.0] },
    { "bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC3" }
  ]
}"#;

    std::fs::write(dir.join("arm.bin"), &bin).unwrap();
    let path = dir.join("arm.gltf");
    std::fs::write(&path, gltf).unwrap();
    path
}
