use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{data_structures::texture, resources::load_binary};

/// Diffuse texture plus the shadow map the color pass samples.
pub fn diffuse_shadow_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("diffuse_shadow_bind_group_layout"),
    })
}

pub fn diffuse_shadow_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    diffuse: &texture::Texture,
    shadow_map: &texture::Texture,
) -> anyhow::Result<wgpu::BindGroup> {
    let (Some(diffuse_sampler), Some(shadow_sampler)) = (&diffuse.sampler, &shadow_map.sampler)
    else {
        anyhow::bail!("diffuse and shadow textures both need a sampler");
    };
    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&diffuse.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(diffuse_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&shadow_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
        ],
        label: Some("diffuse_shadow_bind_group"),
    }))
}

/// Decode every image file into RGBA8, in the order given.
pub async fn load_images(paths: &[PathBuf]) -> anyhow::Result<Vec<image::RgbaImage>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let data = load_binary(path).await?;
        let img = image::load_from_memory(&data)
            .with_context(|| format!("Cannot decode {}", path.display()))?;
        images.push(img.to_rgba8());
    }
    Ok(images)
}

/// Load an image file into an sRGB texture. The format is guessed from the extension.
pub async fn load_texture(
    path: &Path,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<texture::Texture> {
    let data = load_binary(path).await?;
    let format = path.extension().and_then(|ext| ext.to_str());
    texture::Texture::from_bytes(device, queue, &data, &path.to_string_lossy(), format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn images_load_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = [(2, 1), (3, 3)]
            .into_iter()
            .enumerate()
            .map(|(i, (width, height))| {
                let path = dir.path().join(format!("face{i}.png"));
                image::RgbaImage::new(width, height).save(&path).unwrap();
                path
            })
            .collect();
        let images = block_on(load_images(&paths)).unwrap();
        let sizes: Vec<_> = images.iter().map(|img| img.dimensions()).collect();
        assert_eq!(sizes, vec![(2, 1), (3, 3)]);
    }

    #[test]
    fn missing_image_fails_the_whole_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.png");
        image::RgbaImage::new(1, 1).save(&path).unwrap();
        let paths = [path, dir.path().join("back.png")];
        assert!(block_on(load_images(&paths)).is_err());
    }
}
