pub(crate) struct Depth {
    pub(crate) view: wgpu::TextureView,
}

impl Depth {
    pub(crate) const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    pub(crate) fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view }
    }
}
